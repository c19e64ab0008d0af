// src/source/mod.rs
pub mod notion;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ServiceError;
use crate::model::SourceRecord;

pub use notion::NotionSource;

/// Where the schedule comes from. Implementations filter server-side when they can.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Records starting at or after `now` that have a host assigned.
    async fn fetch_eligible(&self, now: DateTime<Utc>) -> Result<Vec<SourceRecord>, ServiceError>;
    fn name(&self) -> &'static str;
}
