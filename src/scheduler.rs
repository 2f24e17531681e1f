use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::cache::FoundCache;
use crate::models::TrackedItem;
use crate::monitor::{CycleReport, CycleRunner};
use crate::utils::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub started_at: DateTime<Utc>,
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    pub last_report: Option<CycleReport>,
}

/// Drives the cycle runner forever with a fixed delay between the end of
/// one cycle and the start of the next, so cycles never overlap.
pub struct MonitorScheduler {
    runner: CycleRunner,
    items: Vec<TrackedItem>,
    cache: FoundCache,
    interval: Duration,
    stats: SchedulerStats,
}

/// Sender side of the shutdown signal. Sending `true` stops new cycles from
/// starting; the cycle in flight runs to completion.
pub type ShutdownTrigger = watch::Sender<bool>;

pub fn shutdown_channel() -> (ShutdownTrigger, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Flips `trigger` on the first signal, then returns when a second signal
/// arrives so the caller can exit without waiting for the cycle in flight.
pub async fn relay_shutdown<F, Fut>(trigger: ShutdownTrigger, mut next_signal: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    next_signal().await;
    tracing::info!("Shutdown requested; finishing the current cycle (signal again to exit now)");
    let _ = trigger.send(true);

    next_signal().await;
    tracing::warn!("Second shutdown signal; exiting without waiting for the current cycle");
}

impl MonitorScheduler {
    pub fn new(runner: CycleRunner, items: Vec<TrackedItem>, cache: FoundCache, interval: Duration) -> Self {
        Self {
            runner,
            items,
            cache,
            interval,
            stats: SchedulerStats {
                started_at: Utc::now(),
                completed_cycles: 0,
                failed_cycles: 0,
                last_report: None,
            },
        }
    }

    pub fn cache(&self) -> &FoundCache {
        &self.cache
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Runs a single cycle and updates the statistics.
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        tracing::info!("Starting at {}", Utc::now().to_rfc3339());

        match self.runner.run_cycle(&self.items, &mut self.cache).await {
            Ok(report) => {
                tracing::info!(
                    available = report.available,
                    unavailable = report.unavailable,
                    failed = report.failed,
                    skipped = report.skipped,
                    unmatched = report.unmatched,
                    "Cycle finished in {} ms",
                    report.total_time_ms
                );
                self.stats.completed_cycles += 1;
                self.stats.last_report = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Cycle failed: {}", e);
                self.stats.failed_cycles += 1;
                Err(e)
            }
        }
    }

    /// Loops until `shutdown` flips to `true` or its sender is dropped.
    /// Cycle failures are logged and never end the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerStats {
        tracing::info!("Monitoring {} items every {} seconds", self.items.len(), self.interval.as_secs());

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            // Errors are already logged inside run_once
            let _ = self.run_once().await;

            tracing::info!("Next run in {} seconds", self.interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "Scheduler stopped after {} cycles ({} failed)",
            self.stats.completed_cycles,
            self.stats.failed_cycles
        );
        self.stats
    }
}
