// Social graph traversal. Distance queries walk accepted edges in the
// follower -> followee direction; the friend-set primitive used by the
// recommender is the undirected accepted neighborhood.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::error::{AppError, AppResult};
use crate::models::Id;
use crate::store::SocialStore;

#[derive(Clone)]
pub struct GraphService {
    store: Arc<dyn SocialStore>,
    config: GraphConfig,
}

impl GraphService {
    pub fn new(store: Arc<dyn SocialStore>, config: GraphConfig) -> Self {
        Self { store, config }
    }

    /// Shortest hop count from `from` to `to` over accepted follow edges,
    /// or `None` when `to` is unreachable within the depth bound.
    ///
    /// The relation is directional: distance(a, b) and distance(b, a) are
    /// independent. Same-node queries are degenerate and rejected; callers
    /// that want 0 for them special-case before calling.
    pub async fn social_distance(&self, from: Id, to: Id) -> AppResult<Option<u32>> {
        if from == to {
            return Err(AppError::Validation(format!(
                "social distance from user {} to themselves is undefined",
                from
            )));
        }
        self.require_user(from).await?;
        self.require_user(to).await?;

        // Frontier expansion, one hop per round. The visited set keeps
        // cycles from re-entering the frontier.
        let mut visited: HashSet<Id> = HashSet::from([from]);
        let mut frontier: Vec<Id> = vec![from];

        for depth in 1..=self.config.max_distance_depth {
            let mut next: Vec<Id> = Vec::new();
            for node in &frontier {
                for neighbor in self.store.accepted_following(*node).await? {
                    if neighbor == to {
                        return Ok(Some(depth));
                    }
                    if visited.insert(neighbor) {
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                return Ok(None);
            }
            frontier = next;
        }

        Ok(None)
    }

    /// The 1-hop accepted neighborhood of a user, in both directions.
    /// This is F(u) for the recommendation engine: someone you follow or
    /// who follows you, with the edge accepted.
    pub async fn friend_set(&self, user_id: Id) -> AppResult<HashSet<Id>> {
        let mut friends: HashSet<Id> =
            self.store.accepted_following(user_id).await?.into_iter().collect();
        friends.extend(self.store.accepted_followers(user_id).await?);
        friends.remove(&user_id);
        Ok(friends)
    }

    async fn require_user(&self, id: Id) -> AppResult<()> {
        if self.store.get_user(id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}
