// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const TICKS_TOTAL: &str = "sync_ticks_total";
pub const TICKS_FAILED_TOTAL: &str = "sync_ticks_failed_total";
pub const TICKS_SKIPPED_TOTAL: &str = "sync_ticks_skipped_total";
pub const RECORDS_TOTAL: &str = "sync_records_total";
pub const PUBLISH_TOTAL: &str = "sync_publish_total";
pub const RECORD_ERRORS_TOTAL: &str = "sync_record_errors_total";
pub const IMAGE_FALLBACK_TOTAL: &str = "sync_image_fallback_total";
pub const STORE_ERRORS_TOTAL: &str = "sync_store_errors_total";
pub const TICK_DURATION_MS: &str = "sync_tick_duration_ms";
pub const LAST_TICK_TS: &str = "sync_last_tick_ts";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(TICKS_TOTAL, "Reconciliation ticks that ran to completion.");
        describe_counter!(TICKS_FAILED_TOTAL, "Ticks aborted because the source query failed.");
        describe_counter!(TICKS_SKIPPED_TOTAL, "Ticks skipped because one was still running.");
        describe_counter!(RECORDS_TOTAL, "Records seen, by outcome.");
        describe_counter!(PUBLISH_TOTAL, "Successful publish calls, by op (create/update).");
        describe_counter!(RECORD_ERRORS_TOTAL, "Records skipped on error, by kind.");
        describe_counter!(IMAGE_FALLBACK_TOTAL, "Events published without image after a fetch failure.");
        describe_counter!(STORE_ERRORS_TOTAL, "Sync state writes that failed.");
        describe_histogram!(TICK_DURATION_MS, "Tick wall time in milliseconds.");
        describe_gauge!(LAST_TICK_TS, "Unix ts of the last finished tick.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// `/metrics` in the Prometheus exposition format, plus `/health`.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
    }
}
