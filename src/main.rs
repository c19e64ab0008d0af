//! cinema-sync binary entrypoint.
//! Loads credentials, probes the three services, then runs the
//! reconciliation scheduler until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cinema_sync::config::SyncConfig;
use cinema_sync::metrics::Metrics;
use cinema_sync::scheduler::{spawn_scheduler, SchedulerCfg};
use cinema_sync::Services;

/// Compact text logs by default, JSON when LOG_FORMAT=json.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cinema_sync=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn serve_metrics(addr: String) -> Result<()> {
    let metrics = Metrics::install()?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;
    info!(%addr, "metrics endpoint listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, metrics.router()).await {
            warn!(error = %e, "metrics server stopped");
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = SyncConfig::load().context("loading configuration")?;
    info!(
        credentials = ?cfg.credentials,
        interval_secs = cfg.tunables.interval_secs,
        concurrency = cfg.tunables.concurrency,
        store = %cfg.tunables.store_path.display(),
        "configuration loaded"
    );

    if let Some(addr) = cfg.tunables.metrics_addr.clone() {
        serve_metrics(addr).await?;
    }

    let services = Services::from_config(&cfg).await?;
    services.probe_all().await;

    let engine = Arc::new(services.engine(&cfg));
    let scheduler = spawn_scheduler(engine, SchedulerCfg::from_secs(cfg.tunables.interval_secs));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutdown requested; waiting for the current tick");
    scheduler.shutdown().await;
    Ok(())
}
