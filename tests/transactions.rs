mod common;

use chrono::Utc;
use social_core::config::Config;
use social_core::models::{
    BatchItemStatus, Community, MemberRole, Membership,
};
use social_core::search::Profile;
use social_core::services::BatchItem;
use social_core::store::{SocialStore, WriteBatch, WriteOp};
use social_core::AppError;

#[tokio::test]
async fn community_and_admin_membership_commit_together() {
    let env = common::env().await;
    let creator = common::user(&env, "creator").await;

    let created = env
        .state
        .coordinator
        .create_community_with_admin(creator, "Atomic Comm", Some("Desc".to_string()), false)
        .await
        .unwrap();
    assert_eq!(created.membership_role, MemberRole::Admin);

    let community = env
        .state
        .store
        .get_community(created.community_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(community.name, "Atomic Comm");
    assert_eq!(community.member_count, 1);

    let membership = env
        .state
        .store
        .get_membership(created.community_id, creator)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.role, MemberRole::Admin);
}

#[tokio::test]
async fn failed_composite_write_leaves_zero_residual_rows() {
    let env = common::env().await;
    let creator = common::user(&env, "creator").await;

    let now = Utc::now();
    let community_id = env.store.generate_id().await.unwrap();
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::InsertCommunity(Community {
        id: community_id,
        creator_id: creator,
        name: "Doomed Comm".to_string(),
        description: None,
        is_private: false,
        member_count: 1,
        version: 0,
        created_at: now,
    }));
    // Forced failure between the two halves of the composite write.
    batch.push(WriteOp::FailPoint("mid-composite".to_string()));
    batch.push(WriteOp::InsertMembership(Membership {
        community_id,
        user_id: creator,
        role: MemberRole::Admin,
        joined_at: now,
    }));

    let err = env.store.apply(batch).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));

    assert!(env.store.get_community(community_id).await.unwrap().is_none());
    assert!(env
        .store
        .get_membership(community_id, creator)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn share_post_fans_out_to_accepted_followers() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;
    let f1 = common::user(&env, "follower_one").await;
    let f2 = common::user(&env, "follower_two").await;
    let f3 = common::user(&env, "follower_three").await;
    for f in [f1, f2, f3] {
        common::follow(&env, f, author).await;
    }

    let shared = env
        .state
        .coordinator
        .share_post_and_notify(author, "big announcement", false)
        .await
        .unwrap();
    assert_eq!(shared.notifications_sent, 3);
    assert_eq!(env.sink.delivered_count(), 3);

    for f in [f1, f2, f3] {
        let inbox = env.store.notifications_for(f).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].post_id, shared.post_id);
    }

    // The write hook indexed the committed post.
    let hits = env
        .state
        .search
        .search_posts("announcement", Profile::English, 10)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].post_id, shared.post_id);
}

#[tokio::test]
async fn forced_failure_unwinds_post_and_notifications() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;
    let follower = common::user(&env, "follower").await;
    common::follow(&env, follower, author).await;

    let err = env
        .state
        .coordinator
        .share_post_and_notify(author, "doomed announcement", true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));

    // No partial post, no notification rows, nothing delivered, nothing
    // indexed.
    assert!(env.store.all_posts().await.unwrap().is_empty());
    assert!(env.store.notifications_for(follower).await.unwrap().is_empty());
    assert_eq!(env.sink.delivered_count(), 0);
    assert!(env
        .state
        .search
        .search_posts("doomed", Profile::English, 10)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn empty_content_is_rejected_before_any_write() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;

    let err = env
        .state
        .coordinator
        .share_post_and_notify(author, "   ", false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(env.store.all_posts().await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_isolates_failures_per_item() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;
    let target = common::post(&env, author, "target post").await;

    let items = vec![
        BatchItem::Post {
            content: Some("first valid".to_string()),
            media_url: None,
            community_id: None,
        },
        // Invalid: no content and no media.
        BatchItem::Post {
            content: None,
            media_url: None,
            community_id: None,
        },
        BatchItem::Comment {
            post_id: target,
            content: "valid comment".to_string(),
            parent_id: None,
        },
        // Invalid: missing post.
        BatchItem::Like { post_id: 404 },
        BatchItem::Like { post_id: target },
    ];

    let results = env
        .state
        .coordinator
        .batch_create(author, items, true)
        .await
        .unwrap();
    assert_eq!(results.len(), 5);

    let statuses: Vec<BatchItemStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            BatchItemStatus::Created,
            BatchItemStatus::Failed,
            BatchItemStatus::Created,
            BatchItemStatus::Failed,
            BatchItemStatus::Created,
        ]
    );
    assert!(results[1].error.is_some());
    assert!(results[3].error.is_some());

    // Exactly the valid items persisted.
    assert_eq!(env.store.all_posts().await.unwrap().len(), 2);
    assert_eq!(env.store.comment_count(target).await.unwrap(), 1);
    assert_eq!(env.store.like_count(target).await.unwrap(), 1);
}

#[tokio::test]
async fn batch_abort_keeps_earlier_commits_and_skips_the_rest() {
    let env = common::env().await;
    let author = common::user(&env, "author").await;

    let items = vec![
        BatchItem::Post {
            content: Some("kept".to_string()),
            media_url: None,
            community_id: None,
        },
        BatchItem::Like { post_id: 404 },
        BatchItem::Post {
            content: Some("never attempted".to_string()),
            media_url: None,
            community_id: None,
        },
    ];

    let results = env
        .state
        .coordinator
        .batch_create(author, items, false)
        .await
        .unwrap();
    let statuses: Vec<BatchItemStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            BatchItemStatus::Created,
            BatchItemStatus::Failed,
            BatchItemStatus::Skipped,
        ]
    );

    // The first item stays committed; the skipped one never ran.
    let posts = env.store.all_posts().await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].content.as_deref(), Some("kept"));
}

#[tokio::test]
async fn join_and_leave_maintain_member_count() {
    let env = common::env().await;
    let creator = common::user(&env, "creator").await;
    let member = common::user(&env, "member").await;

    let created = env
        .state
        .coordinator
        .create_community_with_admin(creator, "Counted", None, false)
        .await
        .unwrap();

    env.state
        .coordinator
        .join_community(created.community_id, member, MemberRole::Member)
        .await
        .unwrap();
    let (count, _) = env
        .store
        .member_count_version(created.community_id)
        .await
        .unwrap();
    assert_eq!(count, 2);

    // Duplicate membership is an invalid edge.
    let err = env
        .state
        .coordinator
        .join_community(created.community_id, member, MemberRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidEdge(_)));

    env.state
        .coordinator
        .leave_community(created.community_id, member)
        .await
        .unwrap();
    let (count, _) = env
        .store
        .member_count_version(created.community_id)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn counter_retry_recovers_from_transient_conflicts() {
    let env = common::env().await;
    let creator = common::user(&env, "creator").await;
    let member = common::user(&env, "member").await;
    let created = env
        .state
        .coordinator
        .create_community_with_admin(creator, "Contended", None, false)
        .await
        .unwrap();

    // One injected conflict: the bounded retry absorbs it.
    env.store.force_counter_conflicts(1);
    env.state
        .coordinator
        .join_community(created.community_id, member, MemberRole::Member)
        .await
        .unwrap();
    let (count, _) = env
        .store
        .member_count_version(created.community_id)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn exhausted_retries_surface_conflict_and_compensate() {
    let env = common::env().await;
    let creator = common::user(&env, "creator").await;
    let member = common::user(&env, "member").await;
    let created = env
        .state
        .coordinator
        .create_community_with_admin(creator, "Hot Counter", None, false)
        .await
        .unwrap();

    // Conflicts past the retry bound: the join fails with Conflict and the
    // membership row is compensated away.
    env.store.force_counter_conflicts(3);
    let err = env
        .state
        .coordinator
        .join_community(created.community_id, member, MemberRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert!(env
        .store
        .get_membership(created.community_id, member)
        .await
        .unwrap()
        .is_none());
    let (count, _) = env
        .store
        .member_count_version(created.community_id)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn concurrent_joins_lose_no_increments() {
    // Raise the retry bound so heavy contention cannot exhaust it.
    let mut config = Config::from_env().unwrap();
    config.retry.max_attempts = 10;
    let env = common::env_with(config).await;

    let creator = common::user(&env, "creator").await;
    let created = env
        .state
        .coordinator
        .create_community_with_admin(creator, "Busy", None, false)
        .await
        .unwrap();

    let mut members = Vec::new();
    for i in 0..5 {
        members.push(common::user(&env, &format!("member_{}", i)).await);
    }

    let mut handles = Vec::new();
    for member in members {
        let coordinator = env.state.coordinator.clone();
        let community_id = created.community_id;
        handles.push(tokio::spawn(async move {
            coordinator
                .join_community(community_id, member, MemberRole::Member)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let (count, _) = env
        .store
        .member_count_version(created.community_id)
        .await
        .unwrap();
    assert_eq!(count, 6);
}
