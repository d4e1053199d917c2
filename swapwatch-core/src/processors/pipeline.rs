//! One pipeline cycle.
//!
//! The pipeline is responsible for:
//! - Optionally asking the contract whether a swap can run (read-only
//!   precheck); a negative answer ends the cycle without error
//! - Invoking the state-changing method with the configured gas ceiling
//!   and deposit
//! - Extracting conversion events from the execution trace
//! - Recording each event, then fanning out notifications
//!
//! Store and delivery failures inside a cycle are logged and absorbed;
//! only ledger failures propagate to the scheduler boundary.

use crate::entities::conversions::RecordConversion;
use crate::extract::extract_conversions;
use crate::framework::DatabaseProcessor;
use crate::ledger::{LedgerClient, LedgerError};
use crate::notify::{Notifier, dispatch_event};
use kanau::processor::Processor;
use thiserror::Error;
use tracing::{error, info};

/// Default gas ceiling: 300 Tgas, the per-transaction maximum.
pub const DEFAULT_GAS: u64 = 300_000_000_000_000;

/// Errors that end a cycle. Recovered at the scheduler: logged, and the
/// next cycle runs at the normal interval.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Remote query or invocation failed
    #[error("ledger call failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Pipeline knobs, built by the daemon's config layer once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// State-changing method triggered each cycle.
    pub invoke_method: String,
    /// Read-only capability check; `None` means always invoke.
    pub precheck_method: Option<String>,
    /// Gas ceiling attached to the invocation.
    pub gas: u64,
    /// yoctoNEAR attached to the invocation.
    pub deposit: u128,
    /// Prefix identifying conversion log lines.
    pub log_marker: String,
}

/// Result of one completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The precheck answered negative; nothing was invoked.
    SkippedByPrecheck,
    /// The invocation ran.
    Completed { events: usize, notified: usize },
}

pub struct Pipeline<L, N> {
    ledger: L,
    notifier: N,
    db: DatabaseProcessor,
    config: PipelineConfig,
}

impl<L: LedgerClient, N: Notifier> Pipeline<L, N> {
    pub fn new(ledger: L, notifier: N, db: DatabaseProcessor, config: PipelineConfig) -> Self {
        Self {
            ledger,
            notifier,
            db,
            config,
        }
    }

    /// Run one cycle end to end.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        if let Some(method) = &self.config.precheck_method {
            if !self.precheck(method).await? {
                info!(method = %method, "Precheck negative, skipping invocation");
                return Ok(CycleOutcome::SkippedByPrecheck);
            }
        }

        let trace = self
            .ledger
            .invoke(
                &self.config.invoke_method,
                serde_json::json!({}),
                self.config.gas,
                self.config.deposit,
            )
            .await?;
        info!(
            transaction_id = %trace.transaction_id,
            outcomes = trace.outcomes.len(),
            "Invocation completed"
        );

        let mut events = 0usize;
        let mut notified = 0usize;
        for event in extract_conversions(&trace, &self.config.log_marker) {
            events += 1;
            // Best-effort recording: a failed insert must not block the
            // notification attempt for the same event.
            if let Err(error) = self
                .db
                .process(RecordConversion {
                    event: event.clone(),
                })
                .await
            {
                error!(
                    transaction_id = %event.transaction_id,
                    %error,
                    "Failed to record conversion"
                );
            }
            match dispatch_event(&self.db, &self.notifier, &event).await {
                Ok(report) => notified += report.delivered,
                Err(error) => error!(
                    transaction_id = %event.transaction_id,
                    %error,
                    "Subscription lookup failed"
                ),
            }
        }
        Ok(CycleOutcome::Completed { events, notified })
    }

    /// Read-only capability check. Only an explicit `false` counts as
    /// negative, matching the contract's boolean view.
    async fn precheck(&self, method: &str) -> Result<bool, PipelineError> {
        let value = self.ledger.query(method, serde_json::json!({})).await?;
        Ok(value.as_bool().unwrap_or(true))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::subscriptions::AddSubscription;
    use crate::ledger::{ExecutionTrace, Outcome};
    use crate::testing::{FakeLedger, RecordingNotifier, memory_pool};

    fn config(precheck: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            invoke_method: "swap".to_string(),
            precheck_method: precheck.map(str::to_string),
            gas: DEFAULT_GAS,
            deposit: 1,
            log_marker: "SWAP:".to_string(),
        }
    }

    fn alice_trace() -> ExecutionTrace {
        ExecutionTrace {
            transaction_id: "FnA3".to_string(),
            outcomes: vec![Outcome {
                id: "r1".to_string(),
                logs: vec![
                    r#"SWAP: {"user":"alice.testnet","source_amount":"100","target_amount":"50","source":"USDC","target":"wNEAR"}"#
                        .to_string(),
                ],
            }],
        }
    }

    async fn db() -> DatabaseProcessor {
        DatabaseProcessor {
            pool: memory_pool().await,
        }
    }

    #[tokio::test]
    async fn negative_precheck_skips_invocation() {
        let ledger = FakeLedger::succeeding(alice_trace());
        *ledger.precheck_answer.lock().unwrap() = serde_json::Value::Bool(false);
        let pipeline = Pipeline::new(
            ledger.clone(),
            RecordingNotifier::default(),
            db().await,
            config(Some("can_swap")),
        );

        let outcome = pipeline.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::SkippedByPrecheck);
        assert_eq!(ledger.invocation_count(), 0);
    }

    #[tokio::test]
    async fn affirmative_precheck_invokes() {
        let ledger = FakeLedger::succeeding(FakeLedger::empty_trace());
        let pipeline = Pipeline::new(
            ledger.clone(),
            RecordingNotifier::default(),
            db().await,
            config(Some("can_swap")),
        );

        let outcome = pipeline.run_cycle().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                events: 0,
                notified: 0
            }
        );
        assert_eq!(ledger.invocations.lock().unwrap().as_slice(), ["swap"]);
    }

    #[tokio::test]
    async fn observed_swap_is_recorded_and_notified() {
        let db = db().await;
        db.process(AddSubscription {
            subscriber_id: "tg1".to_string(),
            watched_address: "alice.testnet".to_string(),
        })
        .await
        .unwrap();

        let notifier = RecordingNotifier::default();
        let pipeline = Pipeline::new(
            FakeLedger::succeeding(alice_trace()),
            notifier.clone(),
            db.clone(),
            config(None),
        );

        let outcome = pipeline.run_cycle().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                events: 1,
                notified: 1
            }
        );

        let transaction_id: String =
            sqlx::query_scalar("SELECT transaction_id FROM conversions")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(transaction_id, "r1");

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "tg1");
        assert!(sent[0].1.contains("100 USDC"));
        assert!(sent[0].1.contains("50 wNEAR"));
    }

    #[tokio::test]
    async fn invoke_failure_surfaces_as_pipeline_error() {
        let pipeline = Pipeline::new(
            FakeLedger::failing(),
            RecordingNotifier::default(),
            db().await,
            config(None),
        );

        assert!(matches!(
            pipeline.run_cycle().await,
            Err(PipelineError::Ledger(_))
        ));
    }

    #[tokio::test]
    async fn record_failure_does_not_block_notification() {
        let db = db().await;
        db.process(AddSubscription {
            subscriber_id: "tg1".to_string(),
            watched_address: "alice.testnet".to_string(),
        })
        .await
        .unwrap();
        // Break the conversions table so the insert fails.
        sqlx::query("DROP TABLE conversions")
            .execute(&db.pool)
            .await
            .unwrap();

        let notifier = RecordingNotifier::default();
        let pipeline = Pipeline::new(
            FakeLedger::succeeding(alice_trace()),
            notifier.clone(),
            db,
            config(None),
        );

        let outcome = pipeline.run_cycle().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Completed {
                events: 1,
                notified: 1
            }
        );
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }
}
