// src/catalog/mod.rs
pub mod tmdb;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::EnrichedMetadata;

pub use tmdb::TmdbCatalog;

/// Read-only metadata lookup keyed by an external reference.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn lookup(&self, external_ref: &str) -> Result<EnrichedMetadata, ServiceError>;
}
