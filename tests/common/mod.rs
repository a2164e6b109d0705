#![allow(dead_code)]

use std::sync::Arc;

use social_core::{
    app_state::AppState,
    config::Config,
    models::Id,
    notify::RecordingSink,
    store::MemoryStore,
};

pub struct TestEnv {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
}

pub async fn env() -> TestEnv {
    env_with(Config::from_env().expect("config")).await
}

pub async fn env_with(config: Config) -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let state = AppState::with_store(config, store.clone(), sink.clone())
        .await
        .expect("app state");
    TestEnv { state, store, sink }
}

pub async fn user(env: &TestEnv, name: &str) -> Id {
    env.state
        .content
        .create_user(name, None, false)
        .await
        .expect("create user")
        .id
}

pub async fn private_user(env: &TestEnv, name: &str) -> Id {
    env.state
        .content
        .create_user(name, None, true)
        .await
        .expect("create user")
        .id
}

/// Accepted follow edge a -> b (b must be public).
pub async fn follow(env: &TestEnv, a: Id, b: Id) {
    env.state.content.follow(a, b).await.expect("follow");
}

pub async fn post(env: &TestEnv, author: Id, content: &str) -> Id {
    env.state
        .content
        .create_post(author, Some(content.to_string()), None, None)
        .await
        .expect("create post")
        .id
}
