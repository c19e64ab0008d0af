// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{ReconcileEngine, TickOutcome};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
}

impl SchedulerCfg {
    pub fn from_secs(interval_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }
}

/// Handle to the background loop. Dropping it also stops the loop at its next wait.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop after the tick in progress (if any) finishes.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "scheduler task ended abnormally");
        }
    }
}

/// Run one tick right away, then one per interval. Ticks never overlap: the
/// loop awaits each tick, and ticks missed while one was running are dropped.
pub fn spawn_scheduler(engine: Arc<ReconcileEngine>, cfg: SchedulerCfg) -> SchedulerHandle {
    let (stop, mut stopped) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stopped.changed() => break,
            }
            tracing::info!(target: "sync", "syncing...");
            match engine.run_tick().await {
                Ok(TickOutcome::Completed(_)) => {}
                Ok(TickOutcome::Skipped) => {
                    tracing::debug!(target: "sync", "tick skipped by engine");
                }
                Err(e) => {
                    tracing::error!(target: "sync", "sync tick failed: {e:#}");
                }
            }
            if *stopped.borrow() {
                break;
            }
        }
        tracing::info!(target: "sync", "scheduler stopped");
    });
    SchedulerHandle { stop, task }
}
