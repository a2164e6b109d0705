use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    hooks::{AuditLogHook, HookRegistry},
    notify::{NotificationSink, TracingSink},
    search::{SearchIndexHook, SearchService},
    services::{
        ContentService, FeedService, GraphService, RecommendationService, ThreadService,
        TransactionCoordinator,
    },
    store::{MemoryStore, PostgresStore, SocialStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SocialStore>,
    pub search: Arc<SearchService>,
    pub graph: GraphService,
    pub recommend: RecommendationService,
    pub threads: ThreadService,
    pub feed: FeedService,
    pub content: ContentService,
    pub coordinator: TransactionCoordinator,
}

impl AppState {
    /// Wire the full stack from config: Postgres when DATABASE_URL is set,
    /// the in-memory store otherwise.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn SocialStore> = if config.database.url.is_empty() {
            tracing::info!("no DATABASE_URL configured, using in-memory store");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(PostgresStore::connect(&config.database.url, 0).await?)
        };
        let state = Self::with_store(config, store, Arc::new(TracingSink)).await?;
        Ok(state)
    }

    /// Wire the stack over an explicit store and notification sink. The
    /// search index is rebuilt from the store before serving.
    pub async fn with_store(
        config: Config,
        store: Arc<dyn SocialStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> AppResult<Self> {
        let search = Arc::new(SearchService::new());
        let indexed = search.rebuild(store.as_ref()).await?;
        tracing::info!(indexed, "search index rebuilt");

        let mut hooks = HookRegistry::new();
        hooks.register(Arc::new(AuditLogHook));
        hooks.register(Arc::new(SearchIndexHook::new(search.clone())));
        let hooks = Arc::new(hooks);

        let graph = GraphService::new(store.clone(), config.graph.clone());
        let recommend = RecommendationService::new(
            store.clone(),
            graph.clone(),
            config.recommend.clone(),
        );
        let threads = ThreadService::new(store.clone(), config.graph.clone());
        let feed = FeedService::new(store.clone(), config.ranking.clone());
        let content = ContentService::new(store.clone(), hooks.clone());
        let coordinator =
            TransactionCoordinator::new(store.clone(), hooks.clone(), sink, config.retry.clone());

        Ok(Self {
            config,
            store,
            search,
            graph,
            recommend,
            threads,
            feed,
            content,
            coordinator,
        })
    }
}
