// Domain records for the social analytics core.
// Every row is owned by the persistence store; services read, derive, write.

pub mod views;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use views::*;

/// Entity and association ids. Allocated by the snowflake generator so id
/// order tracks creation order within a process.
pub type Id = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub bio: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a follow edge. Pending transitions to Accepted or Rejected,
/// both terminal for that edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FollowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowStatus::Pending => "pending",
            FollowStatus::Accepted => "accepted",
            FollowStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: Id,
    pub following_id: Id,
    pub status: FollowStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Id,
    pub author_id: Id,
    pub community_id: Option<Id>,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// A post must carry text or a media reference.
    pub fn has_body(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
            || self.media_url.as_deref().is_some_and(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub author_id: Id,
    pub parent_id: Option<Id>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: Id,
    pub creator_id: Id,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    /// Denormalized count of membership rows, maintained incrementally by
    /// the write path under a version-checked update.
    pub member_count: i64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

/// Membership roles, resolved once into a typed enum instead of a per-call
/// name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Moderator,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Moderator => "moderator",
            MemberRole::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub community_id: Id,
    pub user_id: Id,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub post_id: Id,
    pub user_id: Id,
    pub created_at: DateTime<Utc>,
}

/// Fan-out artifact of share-and-notify: one per accepted follower.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Id,
    pub recipient_id: Id,
    pub actor_id: Id,
    pub post_id: Id,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
