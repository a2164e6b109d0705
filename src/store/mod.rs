// Persistence store seam. The analytical services hold no state of their
// own; they read, derive, and write through this interface.
//
// Writes are staged as a WriteBatch and applied atomically: apply() must
// validate every op against the full constraint set before mutating, so a
// failing batch leaves zero residual rows.

pub mod id_gen;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{
    Comment, Community, FollowEdge, FollowStatus, Id, Like, Membership, Notification, Post, User,
};

pub use id_gen::SnowflakeIdGenerator;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A single staged mutation. Ops reference pre-allocated ids so a batch can
/// wire rows together (e.g. a community and its creator's membership)
/// before anything is committed.
#[derive(Debug, Clone)]
pub enum WriteOp {
    InsertUser(User),
    UpdateUser(User),
    DeleteUser(Id),
    InsertFollow(FollowEdge),
    SetFollowStatus {
        follower_id: Id,
        following_id: Id,
        status: FollowStatus,
    },
    InsertPost(Post),
    UpdatePost(Post),
    DeletePost(Id),
    InsertComment(Comment),
    InsertCommunity(Community),
    InsertMembership(Membership),
    DeleteMembership {
        community_id: Id,
        user_id: Id,
    },
    InsertLike(Like),
    DeleteLike {
        post_id: Id,
        user_id: Id,
    },
    InsertNotification(Notification),
    /// Deliberately injected failure. Never valid; used to force a
    /// mid-batch abort when exercising rollback behavior.
    FailPoint(String),
}

#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Store interface. Read methods operate on a consistent snapshot and hold
/// no locks across calls; concurrent modification between reads is normal.
#[async_trait]
pub trait SocialStore: Send + Sync + std::fmt::Debug {
    async fn generate_id(&self) -> AppResult<Id>;

    /// Apply a batch atomically: all ops persist or none do.
    async fn apply(&self, batch: WriteBatch) -> AppResult<()>;

    // Users
    async fn get_user(&self, id: Id) -> AppResult<Option<User>>;
    async fn get_users(&self, ids: &[Id]) -> AppResult<Vec<User>>;
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn all_users(&self) -> AppResult<Vec<User>>;

    // Follow graph (accepted edges only, unless noted)
    async fn get_follow(&self, follower_id: Id, following_id: Id)
        -> AppResult<Option<FollowEdge>>;
    async fn accepted_following(&self, user_id: Id) -> AppResult<Vec<Id>>;
    async fn accepted_followers(&self, user_id: Id) -> AppResult<Vec<Id>>;
    async fn follower_count(&self, user_id: Id) -> AppResult<u64>;

    // Posts and engagement
    async fn get_post(&self, id: Id) -> AppResult<Option<Post>>;
    async fn all_posts(&self) -> AppResult<Vec<Post>>;
    /// Posts by any of the given authors, newest first.
    async fn posts_by_authors(
        &self,
        author_ids: &[Id],
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<Post>>;
    async fn post_count_by_author(&self, author_id: Id) -> AppResult<u64>;
    async fn like_count(&self, post_id: Id) -> AppResult<u64>;
    async fn comment_count(&self, post_id: Id) -> AppResult<u64>;

    // Comments
    async fn get_comment(&self, id: Id) -> AppResult<Option<Comment>>;
    /// All comments on a post, oldest first (creation order drives sibling
    /// numbering in thread reconstruction).
    async fn comments_for_post(&self, post_id: Id) -> AppResult<Vec<Comment>>;

    // Communities
    async fn get_community(&self, id: Id) -> AppResult<Option<Community>>;
    async fn get_membership(&self, community_id: Id, user_id: Id)
        -> AppResult<Option<Membership>>;
    async fn posts_in_community(&self, community_id: Id) -> AppResult<Vec<Post>>;

    /// Denormalized member counter with its guard version.
    async fn member_count_version(&self, community_id: Id) -> AppResult<(i64, u64)>;
    /// Compare-and-swap on the member counter. Fails with
    /// `AppError::Conflict` when the version no longer matches.
    async fn set_member_count(
        &self,
        community_id: Id,
        count: i64,
        expected_version: u64,
    ) -> AppResult<()>;

    // Activity windows
    /// Posts + comments + likes authored by the user at or after `since`.
    async fn user_activity_since(&self, user_id: Id, since: DateTime<Utc>) -> AppResult<u64>;
    async fn community_posts_since(
        &self,
        community_id: Id,
        since: DateTime<Utc>,
    ) -> AppResult<u64>;

    // Notifications
    async fn notifications_for(&self, recipient_id: Id) -> AppResult<Vec<Notification>>;
}
