// Minimal write path. Single-row CRUD endpoints live upstream; these are
// the writes the analytical core itself needs: they stage a batch, apply it
// atomically, and dispatch the lifecycle hooks that keep derived state
// (search index, audit trail) current.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::hooks::{HookRegistry, WriteEvent};
use crate::models::{Comment, FollowEdge, FollowStatus, Id, Like, Post, User};
use crate::store::{SocialStore, WriteBatch, WriteOp};

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn SocialStore>,
    hooks: Arc<HookRegistry>,
}

impl ContentService {
    pub fn new(store: Arc<dyn SocialStore>, hooks: Arc<HookRegistry>) -> Self {
        Self { store, hooks }
    }

    pub async fn create_user(
        &self,
        username: &str,
        bio: Option<String>,
        is_private: bool,
    ) -> AppResult<User> {
        let now = Utc::now();
        let user = User {
            id: self.store.generate_id().await?,
            username: username.to_string(),
            bio,
            is_private,
            created_at: now,
            updated_at: now,
        };
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertUser(user.clone()));
        self.store.apply(batch).await?;
        self.hooks.dispatch(&WriteEvent::UserCreated(user.clone())).await;
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        user_id: Id,
        bio: Option<String>,
        is_private: Option<bool>,
    ) -> AppResult<User> {
        let mut user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        if let Some(bio) = bio {
            user.bio = Some(bio);
        }
        if let Some(is_private) = is_private {
            user.is_private = is_private;
        }
        user.updated_at = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::UpdateUser(user.clone()));
        self.store.apply(batch).await?;
        self.hooks.dispatch(&WriteEvent::UserUpdated(user.clone())).await;
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: Id) -> AppResult<()> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteUser(user_id));
        self.store.apply(batch).await?;
        self.hooks.dispatch(&WriteEvent::UserDeleted(user_id)).await;
        Ok(())
    }

    /// Request a follow edge. Public targets accept immediately; private
    /// targets leave the edge pending until the target decides.
    pub async fn follow(&self, follower_id: Id, following_id: Id) -> AppResult<FollowEdge> {
        let target = self
            .store
            .get_user(following_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", following_id)))?;

        let edge = FollowEdge {
            follower_id,
            following_id,
            status: if target.is_private {
                FollowStatus::Pending
            } else {
                FollowStatus::Accepted
            },
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertFollow(edge.clone()));
        self.store.apply(batch).await?;
        Ok(edge)
    }

    pub async fn accept_follow(&self, follower_id: Id, following_id: Id) -> AppResult<()> {
        self.set_follow_status(follower_id, following_id, FollowStatus::Accepted)
            .await
    }

    pub async fn reject_follow(&self, follower_id: Id, following_id: Id) -> AppResult<()> {
        self.set_follow_status(follower_id, following_id, FollowStatus::Rejected)
            .await
    }

    async fn set_follow_status(
        &self,
        follower_id: Id,
        following_id: Id,
        status: FollowStatus,
    ) -> AppResult<()> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::SetFollowStatus {
            follower_id,
            following_id,
            status,
        });
        self.store.apply(batch).await
    }

    pub async fn create_post(
        &self,
        author_id: Id,
        content: Option<String>,
        media_url: Option<String>,
        community_id: Option<Id>,
    ) -> AppResult<Post> {
        let now = Utc::now();
        let post = Post {
            id: self.store.generate_id().await?,
            author_id,
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
        Ok(post)
    }

    pub async fn update_post(
        &self,
        post_id: Id,
        content: Option<String>,
        media_url: Option<String>,
    ) -> AppResult<Post> {
        let mut post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
        if content.is_some() {
            post.content = content;
        }
        if media_url.is_some() {
            post.media_url = media_url;
        }
        post.updated_at = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::UpdatePost(post.clone()));
        self.store.apply(batch).await?;
        self.hooks.dispatch(&WriteEvent::PostUpdated(post.clone())).await;
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: Id) -> AppResult<()> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeletePost(post_id));
        self.store.apply(batch).await?;
        self.hooks.dispatch(&WriteEvent::PostDeleted(post_id)).await;
        Ok(())
    }

    pub async fn add_comment(
        &self,
        author_id: Id,
        post_id: Id,
        content: &str,
        parent_id: Option<Id>,
    ) -> AppResult<Comment> {
        let comment = Comment {
            id: self.store.generate_id().await?,
            post_id,
            author_id,
            parent_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertComment(comment.clone()));
        self.store.apply(batch).await?;
        Ok(comment)
    }

    pub async fn like_post(&self, post_id: Id, user_id: Id) -> AppResult<Like> {
        let like = Like {
            post_id,
            user_id,
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertLike(like.clone()));
        self.store.apply(batch).await?;
        Ok(like)
    }

    pub async fn unlike_post(&self, post_id: Id, user_id: Id) -> AppResult<()> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteLike { post_id, user_id });
        self.store.apply(batch).await
    }
}
