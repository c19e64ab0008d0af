// src/publish/mod.rs
pub mod discord;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::PublishRequest;

pub use discord::DiscordPublisher;

/// Target-platform event API. Not idempotent: every `create` makes a new event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Returns the id of the new event.
    async fn create(&self, req: &PublishRequest) -> Result<String, ServiceError>;
    async fn update(&self, event_id: &str, req: &PublishRequest) -> Result<(), ServiceError>;
}
