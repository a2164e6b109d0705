// Transaction coordinator. Composite writes stage a single WriteBatch and
// lean on the store's all-or-nothing apply; batch operations run each item
// in its own batch so one item's failure cannot touch its siblings; counter
// updates go through a version-checked compare-and-swap with bounded retry.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use crate::config::RetryConfig;
use crate::error::{AppError, AppResult};
use crate::hooks::{HookRegistry, WriteEvent};
use crate::models::{
    BatchItemResult, BatchItemStatus, Comment, Community, CommunityCreated, Id, Like, MemberRole,
    Membership, Notification, Post, PostShared,
};
use crate::notify::NotificationSink;
use crate::store::{SocialStore, WriteBatch, WriteOp};

/// One sub-operation of a batch write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BatchItem {
    Post {
        content: Option<String>,
        media_url: Option<String>,
        community_id: Option<Id>,
    },
    Comment {
        post_id: Id,
        content: String,
        parent_id: Option<Id>,
    },
    Like {
        post_id: Id,
    },
}

#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn SocialStore>,
    hooks: Arc<HookRegistry>,
    sink: Arc<dyn NotificationSink>,
    retry: RetryConfig,
}

impl TransactionCoordinator {
    pub fn new(
        store: Arc<dyn SocialStore>,
        hooks: Arc<HookRegistry>,
        sink: Arc<dyn NotificationSink>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            hooks,
            sink,
            retry,
        }
    }

    /// Atomic composite write: the community row and its creator's admin
    /// membership persist together or not at all.
    pub async fn create_community_with_admin(
        &self,
        creator_id: Id,
        name: &str,
        description: Option<String>,
        is_private: bool,
    ) -> AppResult<CommunityCreated> {
        if self.store.get_user(creator_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", creator_id)));
        }
        if name.trim().is_empty() {
            return Err(AppError::Validation("community name must not be empty".to_string()));
        }

        let now = Utc::now();
        let community_id = self.store.generate_id().await?;
        let community = Community {
            id: community_id,
            creator_id,
            name: name.to_string(),
            description,
            is_private,
            // The creator's membership lands in the same batch.
            member_count: 1,
            version: 0,
            created_at: now,
        };
        let membership = Membership {
            community_id,
            user_id: creator_id,
            role: MemberRole::Admin,
            joined_at: now,
        };

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertCommunity(community));
        batch.push(WriteOp::InsertMembership(membership));
        self.store.apply(batch).await?;

        tracing::info!(community_id, creator_id, "community created with admin");
        Ok(CommunityCreated {
            community_id,
            membership_role: MemberRole::Admin,
        })
    }

    /// Write-with-fan-out: the post and one notification row per accepted
    /// follower commit as one unit. Any failure (including the injected
    /// one) unwinds the whole operation; the delivery sink only ever sees
    /// notifications that committed.
    pub async fn share_post_and_notify(
        &self,
        user_id: Id,
        content: &str,
        force_fail: bool,
    ) -> AppResult<PostShared> {
        let author = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        if content.trim().is_empty() {
            return Err(AppError::Validation("post content must not be empty".to_string()));
        }

        let now = Utc::now();
        let post = Post {
            id: self.store.generate_id().await?,
            author_id: user_id,
            community_id: None,
            content: Some(content.to_string()),
            media_url: None,
            created_at: now,
            updated_at: now,
        };

        let followers = self.store.accepted_followers(user_id).await?;
        let mut notifications = Vec::with_capacity(followers.len());
        for follower_id in followers {
            notifications.push(Notification {
                id: self.store.generate_id().await?,
                recipient_id: follower_id,
                actor_id: user_id,
                post_id: post.id,
                body: format!("{} shared a new post", author.username),
                created_at: now,
            });
        }

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertPost(post.clone()));
        for notification in &notifications {
            batch.push(WriteOp::InsertNotification(notification.clone()));
        }
        if force_fail {
            batch.push(WriteOp::FailPoint("share_post_and_notify".to_string()));
        }
        self.store.apply(batch).await?;

        self.hooks.dispatch(&WriteEvent::PostCreated(post.clone())).await;

        let mut sent = 0;
        for notification in &notifications {
            match self.sink.deliver(notification).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!(
                    recipient_id = notification.recipient_id,
                    error = %e,
                    "notification delivery failed"
                ),
            }
        }

        Ok(PostShared {
            post_id: post.id,
            notifications_sent: sent,
        })
    }

    /// Batch with per-item isolation: every item runs in its own staged
    /// batch. A failing item is reported and leaves no partial state; it
    /// neither undoes earlier items nor, with `continue_on_error`, blocks
    /// later ones.
    pub async fn batch_create(
        &self,
        user_id: Id,
        items: Vec<BatchItem>,
        continue_on_error: bool,
    ) -> AppResult<Vec<BatchItemResult>> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        let mut results = Vec::with_capacity(items.len());
        let mut aborted = false;
        for (index, item) in items.into_iter().enumerate() {
            if aborted {
                results.push(BatchItemResult {
                    index,
                    status: BatchItemStatus::Skipped,
                    id: None,
                    error: None,
                });
                continue;
            }
            match self.apply_item(user_id, item).await {
                Ok(id) => results.push(BatchItemResult {
                    index,
                    status: BatchItemStatus::Created,
                    id,
                    error: None,
                }),
                Err(e) => {
                    results.push(BatchItemResult {
                        index,
                        status: BatchItemStatus::Failed,
                        id: None,
                        error: Some(e.to_string()),
                    });
                    if !continue_on_error {
                        aborted = true;
                    }
                }
            }
        }
        Ok(results)
    }

    async fn apply_item(&self, user_id: Id, item: BatchItem) -> AppResult<Option<Id>> {
        let now = Utc::now();
        match item {
            BatchItem::Post {
                content,
                media_url,
                community_id,
            } => {
                let post = Post {
                    id: self.store.generate_id().await?,
                    author_id: user_id,
                    community_id,
                    content,
                    media_url,
                    created_at: now,
                    updated_at: now,
                };
                let mut batch = WriteBatch::new();
                batch.push(WriteOp::InsertPost(post.clone()));
                self.store.apply(batch).await?;
                self.hooks.dispatch(&WriteEvent::PostCreated(post.clone())).await;
                Ok(Some(post.id))
            }
            BatchItem::Comment {
                post_id,
                content,
                parent_id,
            } => {
                let comment = Comment {
                    id: self.store.generate_id().await?,
                    post_id,
                    author_id: user_id,
                    parent_id,
                    content,
                    created_at: now,
                };
                let id = comment.id;
                let mut batch = WriteBatch::new();
                batch.push(WriteOp::InsertComment(comment));
                self.store.apply(batch).await?;
                Ok(Some(id))
            }
            BatchItem::Like { post_id } => {
                let like = Like {
                    post_id,
                    user_id,
                    created_at: now,
                };
                let mut batch = WriteBatch::new();
                batch.push(WriteOp::InsertLike(like));
                self.store.apply(batch).await?;
                Ok(None)
            }
        }
    }

    /// Join a community: the membership row plus the denormalized counter
    /// adjustment. A counter that cannot be updated within the retry bound
    /// compensates the membership away before surfacing the conflict.
    pub async fn join_community(
        &self,
        community_id: Id,
        user_id: Id,
        role: MemberRole,
    ) -> AppResult<Membership> {
        let membership = Membership {
            community_id,
            user_id,
            role,
            joined_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertMembership(membership.clone()));
        self.store.apply(batch).await?;

        if let Err(e) = self.adjust_member_count(community_id, 1).await {
            let mut undo = WriteBatch::new();
            undo.push(WriteOp::DeleteMembership {
                community_id,
                user_id,
            });
            if let Err(undo_err) = self.store.apply(undo).await {
                tracing::error!(community_id, user_id, error = %undo_err, "membership compensation failed");
            }
            return Err(e);
        }
        Ok(membership)
    }

    pub async fn leave_community(&self, community_id: Id, user_id: Id) -> AppResult<()> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteMembership {
            community_id,
            user_id,
        });
        self.store.apply(batch).await?;
        self.adjust_member_count(community_id, -1).await
    }

    /// Optimistic concurrency on the member counter: read the versioned
    /// value, CAS the new one, retry on conflict with jittered backoff up
    /// to the bound, then surface the conflict.
    pub async fn adjust_member_count(&self, community_id: Id, delta: i64) -> AppResult<()> {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_conflict = None;
        for attempt in 0..attempts {
            let (count, version) = self.store.member_count_version(community_id).await?;
            match self
                .store
                .set_member_count(community_id, count + delta, version)
                .await
            {
                Ok(()) => return Ok(()),
                Err(AppError::Conflict(msg)) => {
                    tracing::debug!(community_id, attempt, "member count CAS conflict, retrying");
                    last_conflict = Some(AppError::Conflict(msg));
                    if attempt + 1 < attempts {
                        let backoff = self.retry.base_backoff_ms << attempt;
                        let jitter = rand::rng().random_range(0..=self.retry.base_backoff_ms);
                        sleep(Duration::from_millis(backoff + jitter)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_conflict.unwrap_or_else(|| {
            AppError::Conflict(format!(
                "member count of community {} could not be updated",
                community_id
            ))
        }))
    }
}
