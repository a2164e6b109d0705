mod common;

use social_core::AppError;

#[tokio::test]
async fn thread_reconstructs_nested_replies_in_preorder() {
    let env = common::env().await;
    let u1 = common::user(&env, "author").await;
    let u2 = common::user(&env, "replier").await;
    let u3 = common::user(&env, "nested_replier").await;
    let post = common::post(&env, u1, "root post").await;

    let root = env.state.content.add_comment(u1, post, "Root", None).await.unwrap();
    let reply = env
        .state
        .content
        .add_comment(u2, post, "Reply", Some(root.id))
        .await
        .unwrap();
    let nested = env
        .state
        .content
        .add_comment(u3, post, "Nested", Some(reply.id))
        .await
        .unwrap();
    let second_root = env.state.content.add_comment(u2, post, "Another root", None).await.unwrap();

    let thread = env.state.threads.thread(post).await.unwrap();
    assert_eq!(thread.len(), 4);

    assert_eq!(thread[0].comment_id, root.id);
    assert_eq!(thread[0].depth, 0);
    assert_eq!(thread[0].position, "1");
    assert_eq!(thread[0].path, vec![root.id]);

    assert_eq!(thread[1].comment_id, reply.id);
    assert_eq!(thread[1].parent_id, Some(root.id));
    assert_eq!(thread[1].depth, 1);
    assert_eq!(thread[1].position, "1.1");
    assert_eq!(thread[1].path, vec![root.id, reply.id]);

    assert_eq!(thread[2].comment_id, nested.id);
    assert_eq!(thread[2].depth, 2);
    assert_eq!(thread[2].position, "1.1.1");
    assert_eq!(thread[2].path, vec![root.id, reply.id, nested.id]);

    assert_eq!(thread[3].comment_id, second_root.id);
    assert_eq!(thread[3].depth, 0);
    assert_eq!(thread[3].position, "2");

    // Path length tracks depth exactly.
    for node in &thread {
        assert_eq!(node.path.len() as u32, node.depth + 1);
    }
}

#[tokio::test]
async fn sibling_positions_follow_creation_order() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let post = common::post(&env, u, "root post").await;

    let root = env.state.content.add_comment(u, post, "Root", None).await.unwrap();
    let mut ids = Vec::new();
    for i in 0..3 {
        let c = env
            .state
            .content
            .add_comment(u, post, &format!("reply {}", i), Some(root.id))
            .await
            .unwrap();
        ids.push(c.id);
    }

    let thread = env.state.threads.thread(post).await.unwrap();
    let replies: Vec<_> = thread.iter().filter(|n| n.depth == 1).collect();
    assert_eq!(replies.len(), 3);
    for (i, node) in replies.iter().enumerate() {
        assert_eq!(node.comment_id, ids[i]);
        assert_eq!(node.position, format!("1.{}", i + 1));
    }
}

#[tokio::test]
async fn thread_drops_descendants_past_depth_bound() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let post = common::post(&env, u, "deep thread").await;

    // Chain of 14: depths 0..=13; the default bound keeps depths 0..=10.
    let mut parent = None;
    for i in 0..14 {
        let c = env
            .state
            .content
            .add_comment(u, post, &format!("level {}", i), parent)
            .await
            .unwrap();
        parent = Some(c.id);
    }

    let thread = env.state.threads.thread(post).await.unwrap();
    assert_eq!(thread.len(), 11);
    assert_eq!(thread.last().unwrap().depth, 10);
}

#[tokio::test]
async fn thread_for_missing_post_is_not_found() {
    let env = common::env().await;
    let err = env.state.threads.thread(99).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn ancestors_walk_root_to_target() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let post = common::post(&env, u, "root post").await;

    let root = env.state.content.add_comment(u, post, "Root", None).await.unwrap();
    let reply = env
        .state
        .content
        .add_comment(u, post, "Reply", Some(root.id))
        .await
        .unwrap();
    let nested = env
        .state
        .content
        .add_comment(u, post, "Nested", Some(reply.id))
        .await
        .unwrap();

    let ancestors = env.state.threads.ancestors(nested.id).await.unwrap();
    assert_eq!(ancestors.len(), 3);
    assert_eq!(ancestors[0].comment_id, root.id);
    assert_eq!(ancestors[0].depth, 0);
    assert_eq!(ancestors[1].comment_id, reply.id);
    assert_eq!(ancestors[1].depth, 1);
    assert_eq!(ancestors[2].comment_id, nested.id);
    assert_eq!(ancestors[2].depth, 2);
}

#[tokio::test]
async fn ancestors_of_missing_comment_is_not_found() {
    let env = common::env().await;
    let err = env.state.threads.ancestors(123).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn comment_parent_must_share_the_post() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let post_a = common::post(&env, u, "post a").await;
    let post_b = common::post(&env, u, "post b").await;

    let root = env.state.content.add_comment(u, post_a, "Root", None).await.unwrap();
    let err = env
        .state
        .content
        .add_comment(u, post_b, "Wrong thread", Some(root.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn comment_content_is_required() {
    let env = common::env().await;
    let u = common::user(&env, "author").await;
    let post = common::post(&env, u, "post").await;

    let err = env.state.content.add_comment(u, post, "   ", None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
