mod common;

use chrono::{Duration, Utc};
use social_core::models::{ActivityLevel, MemberRole, Post};
use social_core::store::{SocialStore, WriteBatch, WriteOp};
use social_core::AppError;

/// Insert a post with an explicit timestamp, bypassing the write path.
async fn backdated_post(env: &common::TestEnv, author: i64, content: &str, days_ago: i64) -> i64 {
    let id = env.store.generate_id().await.unwrap();
    let at = Utc::now() - Duration::days(days_ago);
    let post = Post {
        id,
        author_id: author,
        community_id: None,
        content: Some(content.to_string()),
        media_url: None,
        created_at: at,
        updated_at: at,
    };
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::InsertPost(post));
    env.store.apply(batch).await.unwrap();
    id
}

#[tokio::test]
async fn feed_contains_only_followed_authors_in_reverse_chron() {
    let env = common::env().await;
    let viewer = common::user(&env, "viewer").await;
    let followed = common::user(&env, "followed").await;
    let stranger = common::user(&env, "stranger").await;
    common::follow(&env, viewer, followed).await;

    let first = common::post(&env, followed, "first update").await;
    let second = common::post(&env, followed, "second update").await;
    common::post(&env, stranger, "noise from a stranger").await;

    let feed = env.state.feed.feed(viewer, 50, 0).await.unwrap();
    let ids: Vec<i64> = feed.iter().map(|f| f.post_id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn feed_decorates_live_engagement_counts() {
    let env = common::env().await;
    let viewer = common::user(&env, "viewer").await;
    let author = common::user(&env, "author").await;
    let fan1 = common::user(&env, "fan_one").await;
    let fan2 = common::user(&env, "fan_two").await;
    common::follow(&env, viewer, author).await;

    let post = common::post(&env, author, "counted post").await;
    env.state.content.like_post(post, fan1).await.unwrap();
    env.state.content.like_post(post, fan2).await.unwrap();
    env.state.content.add_comment(fan1, post, "nice", None).await.unwrap();

    let feed = env.state.feed.feed(viewer, 50, 0).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].like_count, 2);
    assert_eq!(feed[0].comment_count, 1);
}

#[tokio::test]
async fn feed_pagination_applies_limit_and_offset() {
    let env = common::env().await;
    let viewer = common::user(&env, "viewer").await;
    let author = common::user(&env, "author").await;
    common::follow(&env, viewer, author).await;
    for i in 0..5 {
        common::post(&env, author, &format!("update {}", i)).await;
    }

    let page1 = env.state.feed.feed(viewer, 2, 0).await.unwrap();
    let page2 = env.state.feed.feed(viewer, 2, 2).await.unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 2);
    assert!(page1[1].created_at > page2[0].created_at);
}

#[tokio::test]
async fn engagement_score_weighs_comments_double() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;
    let f1 = common::user(&env, "fan_one").await;
    let f2 = common::user(&env, "fan_two").await;
    let f3 = common::user(&env, "fan_three").await;

    // 3 likes and 2 comments: engagement = 3 + 2*2 = 7.
    let post = common::post(&env, author, "engaging content").await;
    for fan in [f1, f2, f3] {
        env.state.content.like_post(post, fan).await.unwrap();
    }
    env.state.content.add_comment(f1, post, "first", None).await.unwrap();
    env.state.content.add_comment(f2, post, "second", None).await.unwrap();

    let popular = env.state.feed.popular(10, false).await.unwrap();
    let entry = popular.iter().find(|p| p.post_id == post).unwrap();
    assert_eq!(entry.engagement_score, 7);
}

#[tokio::test]
async fn popular_orders_by_engagement_then_recency() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;
    let fan = common::user(&env, "fan").await;

    let quiet = common::post(&env, author, "quiet post").await;
    let liked = common::post(&env, author, "liked post").await;
    env.state.content.like_post(liked, fan).await.unwrap();

    let popular = env.state.feed.popular(10, false).await.unwrap();
    assert_eq!(popular[0].post_id, liked);
    assert_eq!(popular[1].post_id, quiet);
    assert!(popular[0].engagement_score > popular[1].engagement_score);
}

#[tokio::test]
async fn recent_flag_and_filter_use_the_window() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;
    let old = backdated_post(&env, author, "old news", 10).await;
    let fresh = common::post(&env, author, "fresh news").await;

    let all = env.state.feed.popular(10, false).await.unwrap();
    let old_entry = all.iter().find(|p| p.post_id == old).unwrap();
    let fresh_entry = all.iter().find(|p| p.post_id == fresh).unwrap();
    assert!(!old_entry.is_recent);
    assert!(fresh_entry.is_recent);

    let recent = env.state.feed.popular(10, true).await.unwrap();
    let ids: Vec<i64> = recent.iter().map(|p| p.post_id).collect();
    assert!(ids.contains(&fresh));
    assert!(!ids.contains(&old));
}

#[tokio::test]
async fn activity_levels_classify_by_window() {
    let env = common::env().await;

    let active = common::user(&env, "active_user").await;
    common::post(&env, active, "posting today").await;

    let moderate = common::user(&env, "moderate_user").await;
    backdated_post(&env, moderate, "posted two weeks ago", 14).await;

    let inactive = common::user(&env, "inactive_user").await;

    let a = env.state.feed.user_activity(active).await.unwrap();
    assert_eq!(a.level, ActivityLevel::Active);
    assert!(a.week_activity >= 1);

    let m = env.state.feed.user_activity(moderate).await.unwrap();
    assert_eq!(m.level, ActivityLevel::Moderate);
    assert_eq!(m.week_activity, 0);
    assert!(m.month_activity >= 1);

    let i = env.state.feed.user_activity(inactive).await.unwrap();
    assert_eq!(i.level, ActivityLevel::Inactive);
}

#[tokio::test]
async fn community_stats_aggregate_posts_and_engagement() {
    let env = common::env().await;
    let creator = common::user(&env, "creator").await;
    let member = common::user(&env, "member").await;

    let created = env
        .state
        .coordinator
        .create_community_with_admin(creator, "Rustaceans", None, false)
        .await
        .unwrap();
    env.state
        .coordinator
        .join_community(created.community_id, member, MemberRole::Member)
        .await
        .unwrap();

    let post = env
        .state
        .content
        .create_post(
            creator,
            Some("community post".to_string()),
            None,
            Some(created.community_id),
        )
        .await
        .unwrap();
    env.state.content.like_post(post.id, member).await.unwrap();
    env.state
        .content
        .add_comment(member, post.id, "welcome", None)
        .await
        .unwrap();

    let stats = env
        .state
        .feed
        .community_stats(created.community_id)
        .await
        .unwrap();
    assert_eq!(stats.name, "Rustaceans");
    assert_eq!(stats.member_count, 2);
    assert_eq!(stats.total_posts, 1);
    assert_eq!(stats.week_posts, 1);
    // 1 like + 2 * 1 comment.
    assert_eq!(stats.engagement, 3);
    assert_eq!(stats.activity_level, ActivityLevel::Active);

    let err = env.state.feed.community_stats(9999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
