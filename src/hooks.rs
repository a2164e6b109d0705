// Write-path lifecycle hooks. Side effects that the source system hid in
// database triggers (derived search vectors, audit rows) run here as
// explicit synchronous steps, dispatched by the write path after a batch
// commits. Ordering and failure behavior stay visible and testable.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{Id, Post, User};

/// A committed mutation the hooks may react to.
#[derive(Debug, Clone)]
pub enum WriteEvent {
    UserCreated(User),
    UserUpdated(User),
    UserDeleted(Id),
    PostCreated(Post),
    PostUpdated(Post),
    PostDeleted(Id),
}

impl WriteEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WriteEvent::UserCreated(_) => "user_created",
            WriteEvent::UserUpdated(_) => "user_updated",
            WriteEvent::UserDeleted(_) => "user_deleted",
            WriteEvent::PostCreated(_) => "post_created",
            WriteEvent::PostUpdated(_) => "post_updated",
            WriteEvent::PostDeleted(_) => "post_deleted",
        }
    }
}

/// Hook invoked after a write commits. Hooks must be idempotent with
/// respect to re-dispatch of the same event.
#[async_trait]
pub trait WriteHook: Send + Sync {
    /// Hook name for logging.
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &WriteEvent) -> AppResult<()>;
}

/// Ordered hook dispatch. Hooks run in registration order; a failing hook
/// is logged and does not stop later hooks (the rows are already durable).
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn WriteHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn WriteHook>) {
        self.hooks.push(hook);
    }

    pub async fn dispatch(&self, event: &WriteEvent) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_event(event).await {
                tracing::warn!(hook = hook.name(), event = event.kind(), error = %e, "write hook failed");
            }
        }
    }
}

/// Audit hook: records every mutation for later inspection.
pub struct AuditLogHook;

#[async_trait]
impl WriteHook for AuditLogHook {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn on_event(&self, event: &WriteEvent) -> AppResult<()> {
        match event {
            WriteEvent::UserCreated(u) => {
                tracing::info!(user_id = u.id, username = %u.username, "audit: user created")
            }
            WriteEvent::UserUpdated(u) => tracing::info!(user_id = u.id, "audit: user updated"),
            WriteEvent::UserDeleted(id) => tracing::info!(user_id = id, "audit: user deleted"),
            WriteEvent::PostCreated(p) => {
                tracing::info!(post_id = p.id, author_id = p.author_id, "audit: post created")
            }
            WriteEvent::PostUpdated(p) => tracing::info!(post_id = p.id, "audit: post updated"),
            WriteEvent::PostDeleted(id) => tracing::info!(post_id = id, "audit: post deleted"),
        }
        Ok(())
    }
}
