// Full-text search over posts and users. The index is derived state:
// rebuilt from the store at startup and kept current by a write hook, never
// polled.

pub mod index;
pub mod query;
pub mod tokenizer;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::hooks::{WriteEvent, WriteHook};
use crate::models::{CombinedHit, Id, Post, PostHit, SearchKind, User, UserHit};
use crate::store::SocialStore;

use index::{IndexedDoc, SearchIndex};
use query::{evaluate_boolean, evaluate_simple, sort_ranked, RankedDoc};
pub use tokenizer::Profile;

#[derive(Debug, Default)]
pub struct SearchService {
    index: RwLock<SearchIndex>,
}

impl SearchService {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(SearchIndex::new()),
        }
    }

    fn read(&self) -> AppResult<std::sync::RwLockReadGuard<'_, SearchIndex>> {
        self.index
            .read()
            .map_err(|_| AppError::Internal("search index lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<std::sync::RwLockWriteGuard<'_, SearchIndex>> {
        self.index
            .write()
            .map_err(|_| AppError::Internal("search index lock poisoned".to_string()))
    }

    /// Drop the index and re-derive it from the store.
    pub async fn rebuild(&self, store: &dyn SocialStore) -> AppResult<usize> {
        let users = store.all_users().await?;
        let posts = store.all_posts().await?;
        let mut index = self.write()?;
        index.clear();
        for user in &users {
            index.upsert(IndexedDoc::from_user(user));
        }
        for post in &posts {
            index.upsert(IndexedDoc::from_post(post));
        }
        Ok(index.len())
    }

    pub fn index_user(&self, user: &User) -> AppResult<()> {
        self.write()?.upsert(IndexedDoc::from_user(user));
        Ok(())
    }

    pub fn index_post(&self, post: &Post) -> AppResult<()> {
        self.write()?.upsert(IndexedDoc::from_post(post));
        Ok(())
    }

    pub fn remove_user(&self, id: Id) -> AppResult<()> {
        self.write()?.remove(SearchKind::User, id);
        Ok(())
    }

    pub fn remove_post(&self, id: Id) -> AppResult<()> {
        self.write()?.remove(SearchKind::Post, id);
        Ok(())
    }

    pub fn indexed_docs(&self) -> usize {
        self.read().map(|i| i.len()).unwrap_or(0)
    }

    fn collect_posts(
        index: &SearchIndex,
        mut ranked: Vec<RankedDoc>,
        limit: usize,
    ) -> Vec<PostHit> {
        // Equal ranks break toward recency.
        sort_ranked(&mut ranked, |a, b| {
            let da = index.doc(a).map(|d| d.created_at);
            let db = index.doc(b).map(|d| d.created_at);
            db.cmp(&da).then_with(|| b.1.cmp(&a.1))
        });
        ranked
            .into_iter()
            .take(limit)
            .filter_map(|r| {
                index.doc(&r.key).map(|doc| PostHit {
                    post_id: doc.id,
                    author_id: doc.owner_id,
                    content: doc.title.clone(),
                    rank: r.rank,
                })
            })
            .collect()
    }

    fn collect_users(
        index: &SearchIndex,
        mut ranked: Vec<RankedDoc>,
        limit: usize,
    ) -> Vec<UserHit> {
        // Equal ranks break toward username order.
        sort_ranked(&mut ranked, |a, b| {
            let na = index.doc(a).map(|d| d.title.clone()).unwrap_or_default();
            let nb = index.doc(b).map(|d| d.title.clone()).unwrap_or_default();
            na.cmp(&nb).then_with(|| a.1.cmp(&b.1))
        });
        ranked
            .into_iter()
            .take(limit)
            .filter_map(|r| {
                index.doc(&r.key).map(|doc| UserHit {
                    user_id: doc.id,
                    username: doc.title.clone(),
                    bio: doc.bio.clone(),
                    rank: r.rank,
                })
            })
            .collect()
    }

    pub fn search_posts(
        &self,
        query: &str,
        profile: Profile,
        limit: usize,
    ) -> AppResult<Vec<PostHit>> {
        let index = self.read()?;
        let ranked = evaluate_simple(&index, profile, SearchKind::Post, query);
        Ok(Self::collect_posts(&index, ranked, limit))
    }

    pub fn search_users(
        &self,
        query: &str,
        profile: Profile,
        limit: usize,
    ) -> AppResult<Vec<UserHit>> {
        let index = self.read()?;
        let ranked = evaluate_simple(&index, profile, SearchKind::User, query);
        Ok(Self::collect_users(&index, ranked, limit))
    }

    /// Power-user variant: AND/OR/NOT, grouping, quoted phrases.
    pub fn search_posts_advanced(
        &self,
        query: &str,
        profile: Profile,
        limit: usize,
    ) -> AppResult<Vec<PostHit>> {
        let index = self.read()?;
        let ranked = evaluate_boolean(&index, profile, SearchKind::Post, query)?;
        Ok(Self::collect_posts(&index, ranked, limit))
    }

    pub fn search_users_advanced(
        &self,
        query: &str,
        profile: Profile,
        limit: usize,
    ) -> AppResult<Vec<UserHit>> {
        let index = self.read()?;
        let ranked = evaluate_boolean(&index, profile, SearchKind::User, query)?;
        Ok(Self::collect_users(&index, ranked, limit))
    }

    /// Posts and users merged into one relevance-ordered stream, tagged by
    /// kind. Rank ties break post-before-user, then by recency.
    pub fn search_all(
        &self,
        query: &str,
        profile: Profile,
        limit: usize,
    ) -> AppResult<Vec<CombinedHit>> {
        let index = self.read()?;
        let mut ranked = evaluate_simple(&index, profile, SearchKind::Post, query);
        ranked.extend(evaluate_simple(&index, profile, SearchKind::User, query));
        sort_ranked(&mut ranked, |a, b| {
            a.0.cmp(&b.0).then_with(|| {
                let da = index.doc(a).map(|d| d.created_at);
                let db = index.doc(b).map(|d| d.created_at);
                db.cmp(&da)
            })
        });
        Ok(ranked
            .into_iter()
            .take(limit)
            .filter_map(|r| {
                index.doc(&r.key).map(|doc| CombinedHit {
                    kind: doc.kind,
                    id: doc.id,
                    title: doc.title.clone(),
                    rank: r.rank,
                })
            })
            .collect())
    }
}

/// Keeps the derived index current on every content-affecting write.
pub struct SearchIndexHook {
    search: Arc<SearchService>,
}

impl SearchIndexHook {
    pub fn new(search: Arc<SearchService>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl WriteHook for SearchIndexHook {
    fn name(&self) -> &'static str {
        "search_index"
    }

    async fn on_event(&self, event: &WriteEvent) -> AppResult<()> {
        match event {
            WriteEvent::UserCreated(user) | WriteEvent::UserUpdated(user) => {
                self.search.index_user(user)
            }
            WriteEvent::UserDeleted(id) => self.search.remove_user(*id),
            WriteEvent::PostCreated(post) | WriteEvent::PostUpdated(post) => {
                self.search.index_post(post)
            }
            WriteEvent::PostDeleted(id) => self.search.remove_post(*id),
        }
    }
}
