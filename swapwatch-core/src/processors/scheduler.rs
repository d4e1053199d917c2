//! Fixed-interval, non-overlapping cycle driver.
//!
//! The scheduler arms the next tick only after the current cycle has
//! fully settled, so cycles never overlap even when a cycle runs long.
//! The interval never changes, even across consecutive failures.

use super::pipeline::{CycleOutcome, Pipeline};
use crate::ledger::LedgerClient;
use crate::notify::Notifier;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{error, info};

pub struct Scheduler<L, N> {
    pipeline: Pipeline<L, N>,
    interval: Duration,
}

impl<L: LedgerClient, N: Notifier> Scheduler<L, N> {
    pub fn new(pipeline: Pipeline<L, N>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Drive cycles until shutdown is signaled.
    ///
    /// No cycle error terminates the loop: failures surface here as an
    /// audit entry and the next cycle still runs at the configured
    /// interval.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        loop {
            info!(at = %OffsetDateTime::now_utc(), "Cycle starting");

            match self.pipeline.run_cycle().await {
                Ok(CycleOutcome::SkippedByPrecheck) => {
                    info!("Cycle skipped by precheck");
                }
                Ok(CycleOutcome::Completed { events, notified }) => {
                    info!(events, notified, "Cycle completed");
                }
                Err(error) => {
                    error!(%error, "Cycle failed");
                }
            }

            let next_run_at = OffsetDateTime::now_utc() + self.interval;
            info!(%next_run_at, "Cycle finished, next run scheduled");

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Scheduler shutdown complete");
    }
}
