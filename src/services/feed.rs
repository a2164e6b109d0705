// Feed composition and popularity ranking. Engagement is
// like_count + 2 * comment_count; activity classification runs over rolling
// 7-day and 30-day windows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::try_join_all;

use crate::config::RankingConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    ActivityLevel, CommunityStats, FeedItem, Id, PopularPost, UserActivity,
};
use crate::store::SocialStore;

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn SocialStore>,
    config: RankingConfig,
}

impl FeedService {
    pub fn new(store: Arc<dyn SocialStore>, config: RankingConfig) -> Self {
        Self { store, config }
    }

    fn classify(&self, week: u64, month: u64) -> ActivityLevel {
        if week > 0 {
            ActivityLevel::Active
        } else if month > 0 {
            ActivityLevel::Moderate
        } else {
            ActivityLevel::Inactive
        }
    }

    /// Reverse-chronological posts from the users `user_id` accept-follows,
    /// decorated with live engagement counts.
    pub async fn feed(&self, user_id: Id, limit: usize, offset: usize) -> AppResult<Vec<FeedItem>> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        let authors = self.store.accepted_following(user_id).await?;
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let posts = self.store.posts_by_authors(&authors, limit, offset).await?;
        // Count lookups are independent; decorate the page concurrently.
        let items = try_join_all(posts.into_iter().map(|post| {
            let store = self.store.clone();
            async move {
                let like_count = store.like_count(post.id).await?;
                let comment_count = store.comment_count(post.id).await?;
                Ok::<FeedItem, AppError>(FeedItem {
                    post_id: post.id,
                    author_id: post.author_id,
                    content: post.content,
                    like_count,
                    comment_count,
                    created_at: post.created_at,
                })
            }
        }))
        .await?;
        Ok(items)
    }

    /// Posts ordered by engagement score, ties broken by recency. With
    /// `recent_only`, posts older than the recency window are excluded.
    pub async fn popular(&self, limit: usize, recent_only: bool) -> AppResult<Vec<PopularPost>> {
        let cutoff = Utc::now() - Duration::days(self.config.recent_window_days);
        let posts = self.store.all_posts().await?;

        let mut ranked = Vec::with_capacity(posts.len());
        for post in posts {
            let is_recent = post.created_at >= cutoff;
            if recent_only && !is_recent {
                continue;
            }
            let like_count = self.store.like_count(post.id).await?;
            let comment_count = self.store.comment_count(post.id).await?;
            ranked.push(PopularPost {
                post_id: post.id,
                author_id: post.author_id,
                engagement_score: like_count + 2 * comment_count,
                is_recent,
                created_at: post.created_at,
            });
        }

        ranked.sort_by(|a, b| {
            b.engagement_score
                .cmp(&a.engagement_score)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.post_id.cmp(&a.post_id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Rolling activity (posts + comments + likes) for a user with the
    /// three-level classification.
    pub async fn user_activity(&self, user_id: Id) -> AppResult<UserActivity> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }
        let now = Utc::now();
        let week = self
            .store
            .user_activity_since(user_id, now - Duration::days(self.config.active_window_days))
            .await?;
        let month = self
            .store
            .user_activity_since(user_id, now - Duration::days(self.config.moderate_window_days))
            .await?;
        Ok(UserActivity {
            user_id,
            week_activity: week,
            month_activity: month,
            level: self.classify(week, month),
        })
    }

    /// Member count, post volume, summed engagement, and the activity
    /// classification for a community.
    pub async fn community_stats(&self, community_id: Id) -> AppResult<CommunityStats> {
        let community = self
            .store
            .get_community(community_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("community {}", community_id)))?;

        let posts = self.store.posts_in_community(community_id).await?;
        let mut engagement = 0u64;
        for post in &posts {
            let like_count = self.store.like_count(post.id).await?;
            let comment_count = self.store.comment_count(post.id).await?;
            engagement += like_count + 2 * comment_count;
        }

        let now = Utc::now();
        let week_posts = self
            .store
            .community_posts_since(community_id, now - Duration::days(self.config.active_window_days))
            .await?;
        let month_posts = self
            .store
            .community_posts_since(
                community_id,
                now - Duration::days(self.config.moderate_window_days),
            )
            .await?;

        Ok(CommunityStats {
            community_id,
            name: community.name,
            member_count: community.member_count,
            total_posts: posts.len() as u64,
            week_posts,
            month_posts,
            engagement,
            activity_level: self.classify(week_posts, month_posts),
        })
    }
}
