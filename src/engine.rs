// src/engine.rs
//! # Reconciliation Engine
//! One tick: pull eligible source records, diff each against the sync store,
//! enrich, publish (create or update), then persist the new state.
//!
//! Policy: a record is stale only when its start time or catalog reference
//! differs from the stored state. Create-vs-update is decided from local state
//! alone. One record's failure never aborts the tick; a failing source query
//! does.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::asset::AssetMaterializer;
use crate::catalog::CatalogLookup;
use crate::error::RecordError;
use crate::metrics as m;
use crate::model::{PublishOp, SourceRecord, SyncState};
use crate::publish::EventPublisher;
use crate::render;
use crate::source::RecordSource;
use crate::store::SyncStore;

/// Service handles the engine drives. Injected so tests can swap in fakes.
#[derive(Clone)]
pub struct EngineDeps {
    pub source: Arc<dyn RecordSource>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub assets: Arc<dyn AssetMaterializer>,
    pub publisher: Arc<dyn EventPublisher>,
    pub store: Arc<dyn SyncStore>,
}

/// What to do with one record, given its stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Skip,
    Publish(PublishOp),
}

/// Pure diff step: unchanged records are skipped, everything else is published.
pub fn plan(state: Option<&SyncState>, external_ref: &str, scheduled_at: DateTime<Utc>) -> Plan {
    match state {
        Some(s) if s.matches(external_ref, scheduled_at) => Plan::Skip,
        _ => Plan::Publish(PublishOp::for_state(state)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub ineligible: usize,
    pub unchanged: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub image_fallbacks: usize,
    pub store_errors: usize,
}

impl TickReport {
    fn absorb(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Unchanged => self.unchanged += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
            RecordOutcome::Published {
                op,
                image_fallback,
                store_error,
            } => {
                match op {
                    PublishOp::Create => self.created += 1,
                    PublishOp::Update { .. } => self.updated += 1,
                }
                self.image_fallbacks += usize::from(*image_fallback);
                self.store_errors += usize::from(*store_error);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// Another tick held the engine.
    Skipped,
}

#[derive(Debug)]
enum RecordOutcome {
    Unchanged,
    Published {
        op: PublishOp,
        image_fallback: bool,
        store_error: bool,
    },
    Failed(RecordError),
}

impl RecordOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Published { .. } => "published",
            Self::Failed(_) => "failed",
        }
    }
}

pub struct ReconcileEngine {
    deps: EngineDeps,
    channel_id: String,
    concurrency: usize,
    in_flight: Mutex<()>,
}

impl ReconcileEngine {
    pub fn new(deps: EngineDeps, channel_id: impl Into<String>) -> Self {
        Self {
            deps,
            channel_id: channel_id.into(),
            concurrency: 1,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub async fn run_tick(&self) -> Result<TickOutcome> {
        self.run_tick_at(Utc::now()).await
    }

    /// One reconciliation pass as of `now`. Single-flight: returns `Skipped`
    /// when another tick is still running.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            counter!(m::TICKS_SKIPPED_TOTAL).increment(1);
            warn!("previous tick still running; skipping");
            return Ok(TickOutcome::Skipped);
        };
        m::ensure_described();
        let started = Instant::now();

        let records = match self.deps.source.fetch_eligible(now).await {
            Ok(r) => r,
            Err(e) => {
                counter!(m::TICKS_FAILED_TOTAL).increment(1);
                return Err(anyhow::Error::new(e)
                    .context(format!("fetching records from {}", self.deps.source.name())));
            }
        };

        let mut report = TickReport {
            fetched: records.len(),
            ..TickReport::default()
        };
        let (eligible, ineligible): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.is_eligible(now));
        report.ineligible = ineligible.len();

        let outcomes: Vec<RecordOutcome> = stream::iter(eligible)
            .map(|rec| async move { self.process(&rec).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            counter!(m::RECORDS_TOTAL, "outcome" => outcome.label()).increment(1);
            report.absorb(outcome);
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        counter!(m::TICKS_TOTAL).increment(1);
        histogram!(m::TICK_DURATION_MS).record(elapsed_ms);
        gauge!(m::LAST_TICK_TS).set(Utc::now().timestamp() as f64);

        info!(
            fetched = report.fetched,
            unchanged = report.unchanged,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            store_errors = report.store_errors,
            elapsed_ms = elapsed_ms as u64,
            "sync tick done"
        );
        Ok(TickOutcome::Completed(report))
    }

    async fn process(&self, rec: &SourceRecord) -> RecordOutcome {
        let external_ref = match rec.external_ref() {
            Ok(r) => r,
            Err(e) => return fail(rec, None, e),
        };

        let state = match self.deps.store.get(&rec.id).await {
            Ok(s) => s,
            Err(e) => return fail(rec, Some(external_ref.as_str()), RecordError::StoreRead(e)),
        };

        let op = match plan(state.as_ref(), &external_ref, rec.scheduled_at) {
            Plan::Skip => {
                debug!(record_id = %rec.id, external_ref = %external_ref, "unchanged");
                return RecordOutcome::Unchanged;
            }
            Plan::Publish(op) => op,
        };

        let meta = match self.deps.catalog.lookup(&external_ref).await {
            Ok(meta) => meta,
            Err(e) => return fail(rec, Some(external_ref.as_str()), RecordError::Enrichment(e)),
        };

        let mut image_fallback = false;
        let image = match meta.image_ref.as_deref() {
            None => None,
            Some(image_ref) => match self.deps.assets.materialize(image_ref).await {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(
                        record_id = %rec.id,
                        image_ref,
                        error = %e,
                        "image fetch failed; publishing without image"
                    );
                    counter!(m::IMAGE_FALLBACK_TOTAL).increment(1);
                    image_fallback = true;
                    None
                }
            },
        };

        let req = render::build_request(rec, &external_ref, &meta, image, &self.channel_id);

        let published = match &op {
            PublishOp::Create => self.deps.publisher.create(&req).await,
            PublishOp::Update { event_id } => self
                .deps
                .publisher
                .update(event_id, &req)
                .await
                .map(|()| event_id.clone()),
        };
        let event_id = match published {
            Ok(id) => id,
            Err(e) => return fail(rec, Some(external_ref.as_str()), RecordError::Publish(e)),
        };
        counter!(m::PUBLISH_TOTAL, "op" => op.label()).increment(1);
        info!(
            record_id = %rec.id,
            event_id = %event_id,
            op = op.label(),
            name = %req.name,
            "event published"
        );

        let new_state = SyncState {
            external_ref,
            scheduled_at: rec.scheduled_at,
            target_event_id: Some(event_id.clone()),
        };
        let store_error = match self.deps.store.set(&rec.id, new_state).await {
            Ok(()) => false,
            Err(e) => {
                counter!(m::STORE_ERRORS_TOTAL).increment(1);
                error!(
                    record_id = %rec.id,
                    event_id = %event_id,
                    op = op.label(),
                    error = %e,
                    "sync state not persisted; next tick will publish again"
                );
                true
            }
        };

        RecordOutcome::Published {
            op,
            image_fallback,
            store_error,
        }
    }
}

fn fail(rec: &SourceRecord, external_ref: Option<&str>, err: RecordError) -> RecordOutcome {
    counter!(m::RECORD_ERRORS_TOTAL, "kind" => err.kind()).increment(1);
    warn!(
        record_id = %rec.id,
        external_ref = external_ref.unwrap_or("-"),
        kind = err.kind(),
        error = %err,
        "record skipped"
    );
    RecordOutcome::Failed(err)
}
