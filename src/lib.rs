// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod asset;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod metrics;
pub mod model;
pub mod publish;
pub mod render;
pub mod scheduler;
pub mod source;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::engine::{EngineDeps, Plan, ReconcileEngine, TickOutcome, TickReport};
pub use crate::error::{RecordError, ServiceError, StoreError};
pub use crate::model::{
    EnrichedMetadata, ImagePayload, Privacy, PublishOp, PublishRequest, SourceRecord, SyncState,
};

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::asset::HttpAssetMaterializer;
use crate::catalog::TmdbCatalog;
use crate::config::SyncConfig;
use crate::publish::DiscordPublisher;
use crate::source::notion::{NotionSource, PropertyNames};
use crate::store::JsonFileStore;

/// Concrete clients, kept typed so the binary can probe them before handing
/// them to the engine as trait objects.
pub struct Services {
    pub source: Arc<NotionSource>,
    pub catalog: Arc<TmdbCatalog>,
    pub assets: Arc<HttpAssetMaterializer>,
    pub publisher: Arc<DiscordPublisher>,
    pub store: Arc<JsonFileStore>,
}

impl Services {
    pub async fn from_config(cfg: &SyncConfig) -> Result<Self> {
        let creds = &cfg.credentials;
        let t = &cfg.tunables;
        let http = http::build_client(t)?;

        let props = PropertyNames::from(t);
        let store = JsonFileStore::open(&t.store_path).await?;
        info!(
            path = %store.path().display(),
            entries = store.len().await,
            "sync store loaded"
        );
        Ok(Self {
            source: Arc::new(NotionSource::new(
                http.clone(),
                &creds.notion_token,
                &creds.notion_database_id,
                props,
            )),
            catalog: Arc::new(TmdbCatalog::new(http.clone(), &creds.tmdb_key)),
            assets: Arc::new(HttpAssetMaterializer::new(
                http.clone(),
                &t.image_base_url,
                &t.scratch_dir,
                t.max_image_bytes,
            )),
            publisher: Arc::new(DiscordPublisher::new(
                http,
                &creds.discord_token,
                &creds.discord_guild_id,
                &t.audit_reason,
            )),
            store: Arc::new(store),
        })
    }

    /// Authenticate once against every service. Failures are logged, not fatal:
    /// the next tick reports them again with record context.
    pub async fn probe_all(&self) {
        if let Err(e) = self.source.probe().await {
            warn!(error = %e, "notion probe failed; check NOTION_TOKEN / NOTION_DATABASE_ID");
        }
        if let Err(e) = self.catalog.probe().await {
            warn!(error = %e, "tmdb probe failed; check TMDB_KEY");
        }
        if let Err(e) = self.publisher.probe().await {
            warn!(error = %e, "discord probe failed; is the bot in the server?");
        }
    }

    pub fn engine(&self, cfg: &SyncConfig) -> ReconcileEngine {
        let deps = EngineDeps {
            source: self.source.clone(),
            catalog: self.catalog.clone(),
            assets: self.assets.clone(),
            publisher: self.publisher.clone(),
            store: self.store.clone(),
        };
        ReconcileEngine::new(deps, &cfg.credentials.discord_channel_id)
            .with_concurrency(cfg.tunables.concurrency)
    }
}
