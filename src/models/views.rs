// Derived records returned by the analytical services. Plain serde shapes,
// one per operation on the external surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// "People you may know" entry, ranked by score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub candidate_id: Id,
    pub username: String,
    pub mutual_count: u32,
    pub score: f64,
}

/// One comment in a reconstructed thread, in depth-first pre-order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadNode {
    pub comment_id: Id,
    pub parent_id: Option<Id>,
    /// 0 for roots, increasing toward the leaves.
    pub depth: u32,
    /// Ancestor ids from the root down to this comment, inclusive.
    pub path: Vec<Id>,
    /// Dot-delimited sibling order, e.g. "1.2.3". Siblings are numbered in
    /// creation order, so the string sorts the way the thread renders.
    pub position: String,
    pub content: String,
    pub author_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestorNode {
    pub comment_id: Id,
    pub parent_id: Option<Id>,
    pub depth: u32,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Post,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostHit {
    pub post_id: Id,
    pub author_id: Id,
    pub content: String,
    pub rank: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserHit {
    pub user_id: Id,
    pub username: String,
    pub bio: Option<String>,
    pub rank: f64,
}

/// A post or user hit in the combined relevance stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedHit {
    pub kind: SearchKind,
    pub id: Id,
    pub title: String,
    pub rank: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub post_id: Id,
    pub author_id: Id,
    pub content: Option<String>,
    pub like_count: u64,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularPost {
    pub post_id: Id,
    pub author_id: Id,
    /// like_count + 2 * comment_count.
    pub engagement_score: u64,
    pub is_recent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// Activity within the 7-day window.
    Active,
    /// Activity within the 30-day window but not the 7-day one.
    Moderate,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: Id,
    pub week_activity: u64,
    pub month_activity: u64,
    pub level: ActivityLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityStats {
    pub community_id: Id,
    pub name: String,
    pub member_count: i64,
    pub total_posts: u64,
    pub week_posts: u64,
    pub month_posts: u64,
    pub engagement: u64,
    pub activity_level: ActivityLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityCreated {
    pub community_id: Id,
    pub membership_role: super::MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostShared {
    pub post_id: Id,
    pub notifications_sent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemStatus {
    Created,
    Failed,
    Skipped,
}

/// Per-item outcome of a batch write. The batch as a whole never reports a
/// single pass/fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub status: BatchItemStatus,
    pub id: Option<Id>,
    pub error: Option<String>,
}
