// Notification delivery seam. The core records notification rows in the
// same batch as the post that caused them; actual delivery goes through
// this channel after the batch commits.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use crate::error::{AppError, AppResult};
use crate::models::Notification;

#[async_trait]
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    async fn deliver(&self, notification: &Notification) -> AppResult<()>;
}

/// Default sink: structured log lines, one per delivery.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        tracing::info!(
            recipient_id = notification.recipient_id,
            actor_id = notification.actor_id,
            post_id = notification.post_id,
            "notification delivered"
        );
        Ok(())
    }
}

/// Captures deliveries in memory. Used by the test suite to assert that
/// rolled-back fan-outs never reach the channel.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Vec<Notification>>> {
        self.delivered
            .lock()
            .map_err(|_| AppError::Internal("sink lock poisoned".to_string()))
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn delivered_count(&self) -> usize {
        self.lock().map(|g| g.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> AppResult<()> {
        self.lock()?.push(notification.clone());
        Ok(())
    }
}
