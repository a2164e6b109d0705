mod common;

use social_core::models::SearchKind;
use social_core::search::Profile;

#[tokio::test]
async fn write_hook_keeps_index_current() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let post = common::post(&env, u, "fresh espresso machine review").await;

    let hits = env
        .state
        .search
        .search_posts("espresso", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].post_id, post);

    env.state.content.delete_post(post).await.unwrap();
    let hits = env
        .state
        .search
        .search_posts("espresso", Profile::English, 10)
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn ranks_strictly_by_term_frequency() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let once = common::post(&env, u, "coffee with milk").await;
    let twice = common::post(&env, u, "coffee coffee everywhere").await;

    let hits = env
        .state
        .search
        .search_posts("coffee", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].post_id, twice);
    assert_eq!(hits[1].post_id, once);
    assert!(hits[0].rank > hits[1].rank);
}

#[tokio::test]
async fn equal_ranks_fall_back_to_recency_for_posts() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let older = common::post(&env, u, "morning coffee notes").await;
    let newer = common::post(&env, u, "evening coffee notes").await;

    let hits = env
        .state
        .search
        .search_posts("coffee", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].post_id, newer);
    assert_eq!(hits[1].post_id, older);
    assert_eq!(hits[0].rank, hits[1].rank);
}

#[tokio::test]
async fn username_outweighs_bio() {
    let env = common::env().await;
    env.state
        .content
        .create_user("coffee_roaster", None, false)
        .await
        .unwrap();
    env.state
        .content
        .create_user("anna", Some("I roast coffee at home".to_string()), false)
        .await
        .unwrap();

    let hits = env
        .state
        .search
        .search_users("coffee", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].username, "coffee_roaster");
    assert!(hits[0].rank > hits[1].rank);
}

#[tokio::test]
async fn equal_user_ranks_order_by_name() {
    let env = common::env().await;
    env.state
        .content
        .create_user("zeynep", Some("gardening and tea".to_string()), false)
        .await
        .unwrap();
    env.state
        .content
        .create_user("ali", Some("tea above all".to_string()), false)
        .await
        .unwrap();

    let hits = env
        .state
        .search
        .search_users("tea", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].username, "ali");
    assert_eq!(hits[1].username, "zeynep");
}

#[tokio::test]
async fn turkish_profile_folds_case_and_keeps_diacritics() {
    let env = common::env().await;
    let u = common::user(&env, "yazar").await;
    let post = common::post(&env, u, "ISPARTA gezisi ve çay bahçeleri").await;

    // Dotless folding: query "ısparta" must reach the uppercase original.
    let hits = env
        .state
        .search
        .search_posts("ısparta", Profile::Turkish, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].post_id, post);

    let hits = env
        .state
        .search
        .search_posts("çay", Profile::Turkish, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn bilingual_profile_spans_mixed_content() {
    let env = common::env().await;
    let u = common::user(&env, "mixed_author").await;
    common::post(&env, u, "İstanbul'da weekend kahve tasting").await;

    for query in ["istanbul", "kahve", "weekend"] {
        let hits = env
            .state
            .search
            .search_posts(query, Profile::Bilingual, 10)
            .unwrap();
        assert_eq!(hits.len(), 1, "query {} should match", query);
    }
}

#[tokio::test]
async fn stopwords_do_not_match() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    common::post(&env, u, "the cat sat on the mat").await;

    let hits = env
        .state
        .search
        .search_posts("the", Profile::English, 10)
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn implicit_union_matches_any_term() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let coffee = common::post(&env, u, "coffee brewing guide").await;
    let tea = common::post(&env, u, "tea steeping guide").await;

    let hits = env
        .state
        .search
        .search_posts("coffee tea", Profile::English, 10)
        .unwrap();
    let ids: Vec<i64> = hits.iter().map(|h| h.post_id).collect();
    assert!(ids.contains(&coffee));
    assert!(ids.contains(&tea));
}

#[tokio::test]
async fn boolean_connectives_narrow_results() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let dark = common::post(&env, u, "dark roast coffee beans").await;
    common::post(&env, u, "light roast tea blend").await;

    let hits = env
        .state
        .search
        .search_posts_advanced("roast AND NOT tea", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].post_id, dark);

    let hits = env
        .state
        .search
        .search_posts_advanced("coffee OR tea", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn phrase_queries_require_adjacency() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let adjacent = common::post(&env, u, "single origin beans from kenya").await;
    common::post(&env, u, "single estate, washed origin process").await;

    let hits = env
        .state
        .search
        .search_posts_advanced("\"single origin\"", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].post_id, adjacent);
}

#[tokio::test]
async fn malformed_boolean_query_is_rejected() {
    let env = common::env().await;
    assert!(env
        .state
        .search
        .search_posts_advanced("(coffee", Profile::English, 10)
        .is_err());
    assert!(env
        .state
        .search
        .search_posts_advanced("\"open phrase", Profile::English, 10)
        .is_err());
}

#[tokio::test]
async fn combined_search_tags_result_kinds() {
    let env = common::env().await;
    let u = env
        .state
        .content
        .create_user("kahve_fan", None, false)
        .await
        .unwrap();
    let post = common::post(&env, u.id, "kahve molası her gün").await;

    let hits = env
        .state
        .search
        .search_all("kahve", Profile::Bilingual, 10)
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().any(|h| h.kind == SearchKind::Post && h.id == post));
    assert!(hits.iter().any(|h| h.kind == SearchKind::User && h.id == u.id));
}

#[tokio::test]
async fn post_edit_reindexes_content() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let post = common::post(&env, u, "original draft text").await;

    env.state
        .content
        .update_post(post, Some("polished final version".to_string()), None)
        .await
        .unwrap();

    assert!(env
        .state
        .search
        .search_posts("draft", Profile::English, 10)
        .unwrap()
        .is_empty());
    let hits = env
        .state
        .search
        .search_posts("polished", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].post_id, post);
}

#[tokio::test]
async fn profile_update_reindexes_user() {
    let env = common::env().await;
    let u = env
        .state
        .content
        .create_user("plain_user", Some("nothing here".to_string()), false)
        .await
        .unwrap();

    assert!(env
        .state
        .search
        .search_users("astronomy", Profile::English, 10)
        .unwrap()
        .is_empty());

    env.state
        .content
        .update_profile(u.id, Some("amateur astronomy at night".to_string()), None)
        .await
        .unwrap();

    let hits = env
        .state
        .search
        .search_users("astronomy", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].user_id, u.id);
}
