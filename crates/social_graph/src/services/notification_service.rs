use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::info;

use crate::{models::activity::ActivityEvent, utils::api_errors::ApiError};

pub const NOTIFICATIONS_KEY: &str = "social:notifications";

/// Receives activity-feed events after the operation that produced them has
/// committed. Failures are logged by the caller and never undo the operation.
#[async_trait]
pub trait ActivityNotifier: Send + Sync {
    async fn notify(&self, event: &ActivityEvent) -> Result<(), ApiError>;
}

/// Pushes events as JSON onto a Redis list consumed by the feed workers.
pub struct RedisActivityNotifier {
    redis: Arc<redis::Client>,
}

impl RedisActivityNotifier {
    pub fn new(redis_url: &str) -> Result<Self, ApiError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            redis: Arc::new(client),
        })
    }
}

#[async_trait]
impl ActivityNotifier for RedisActivityNotifier {
    async fn notify(&self, event: &ActivityEvent) -> Result<(), ApiError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let event_json = serde_json::to_string(event)?;
        let _: i64 = conn.lpush(NOTIFICATIONS_KEY, event_json).await?;
        Ok(())
    }
}

/// Used when no Redis is configured.
pub struct LogActivityNotifier;

#[async_trait]
impl ActivityNotifier for LogActivityNotifier {
    async fn notify(&self, event: &ActivityEvent) -> Result<(), ApiError> {
        info!(recipient = %event.kind.recipient(), "activity: {}", event);
        Ok(())
    }
}
