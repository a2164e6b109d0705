// "People you may know": friend-of-friend candidates scored by mutual
// count, posting volume, and audience size. The coefficients are policy,
// supplied by config rather than baked in.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RecommendConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Id, Recommendation};
use crate::store::SocialStore;

use super::graph::GraphService;

#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn SocialStore>,
    graph: GraphService,
    config: RecommendConfig,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn SocialStore>,
        graph: GraphService,
        config: RecommendConfig,
    ) -> Self {
        Self { store, graph, config }
    }

    /// Ranked connection candidates for `user_id`. Candidates are friends
    /// of friends, never the user or an existing friend; a closed circle
    /// of friends yields an empty list rather than an error.
    pub async fn recommend(&self, user_id: Id) -> AppResult<Vec<Recommendation>> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        let friends = self.graph.friend_set(user_id).await?;
        if friends.is_empty() {
            return Ok(Vec::new());
        }

        // mutual_count(c) = number of distinct friends whose own friend
        // set contains c.
        let mut mutual_counts: HashMap<Id, u32> = HashMap::new();
        for friend in &friends {
            for candidate in self.graph.friend_set(*friend).await? {
                if candidate == user_id || friends.contains(&candidate) {
                    continue;
                }
                *mutual_counts.entry(candidate).or_insert(0) += 1;
            }
        }

        let mut recommendations = Vec::with_capacity(mutual_counts.len());
        for (candidate_id, mutual_count) in mutual_counts {
            // Candidates can disappear between reads; skip rather than fail.
            let Some(user) = self.store.get_user(candidate_id).await? else {
                continue;
            };
            let post_count = self.store.post_count_by_author(candidate_id).await?;
            let follower_count = self.store.follower_count(candidate_id).await?;
            let score = round2(
                mutual_count as f64 * self.config.mutual_weight
                    + post_count as f64 * self.config.post_weight
                    + follower_count as f64 * self.config.follower_weight,
            );
            recommendations.push(Recommendation {
                candidate_id,
                username: user.username,
                mutual_count,
                score,
            });
        }

        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.mutual_count.cmp(&a.mutual_count))
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        recommendations.truncate(self.config.max_results);
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(12.345678), 12.35);
        assert_eq!(round2(0.1 + 0.2), 0.3);
        assert_eq!(round2(21.0), 21.0);
    }
}
