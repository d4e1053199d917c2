//! Notification dispatch.
//!
//! Resolves the subscriptions watching an event's subject address and
//! pushes one alert to each through the [`Notifier`] port. [`telegram`]
//! provides the production transport.

pub mod telegram;

use crate::entities::conversions::ConversionEvent;
use crate::entities::subscriptions::ListSubscriptionsByAddress;
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Per-subscriber delivery errors. Recovered inside the dispatcher:
/// logged, and the remaining subscribers are still attempted.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP transport failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The messaging API answered but refused the delivery
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Port to the messaging transport. One attempt per call; the
/// dispatcher only logs the outcome and never retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subscriber_id: &str, text: &str) -> Result<(), NotifyError>;
}

/// Fixed-format alert text for one conversion.
pub fn alert_text(event: &ConversionEvent) -> String {
    format!(
        "{} swapped {} {} for {} {} (tx: {})",
        event.subject_address,
        event.source_amount,
        event.source_asset,
        event.target_amount,
        event.target_asset,
        event.transaction_id,
    )
}

/// How one dispatch round went. Failures are already logged by the time
/// the report is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Fan one event out to every subscription watching its subject address.
///
/// An empty match set is a no-op, not an error. A delivery failure for
/// one subscriber does not stop the attempts to the rest. Only the
/// subscription lookup itself can fail the call, since without it there
/// is nobody to notify.
pub async fn dispatch_event(
    db: &DatabaseProcessor,
    notifier: &dyn Notifier,
    event: &ConversionEvent,
) -> Result<DispatchReport, sqlx::Error> {
    let subscriptions = db
        .process(ListSubscriptionsByAddress {
            address: event.subject_address.clone(),
        })
        .await?;
    if subscriptions.is_empty() {
        debug!(subject = %event.subject_address, "No subscriptions for conversion");
        return Ok(DispatchReport::default());
    }

    let text = alert_text(event);
    let mut report = DispatchReport {
        matched: subscriptions.len(),
        ..DispatchReport::default()
    };
    for subscription in subscriptions {
        match notifier.send(&subscription.subscriber_id, &text).await {
            Ok(()) => {
                info!(
                    subscriber = %subscription.subscriber_id,
                    subject = %event.subject_address,
                    "Notification dispatched"
                );
                report.delivered += 1;
            }
            Err(error) => {
                warn!(
                    subscriber = %subscription.subscriber_id,
                    %error,
                    "Notification delivery failed"
                );
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::subscriptions::AddSubscription;
    use crate::testing::{RecordingNotifier, memory_pool};
    use rust_decimal::Decimal;

    fn event_for(subject: &str) -> ConversionEvent {
        ConversionEvent {
            transaction_id: "r1".to_string(),
            subject_address: subject.to_string(),
            source_amount: Decimal::from(100),
            target_amount: Decimal::from(50),
            source_asset: "USDC".to_string(),
            target_asset: "wNEAR".to_string(),
        }
    }

    async fn db_with_watchers(subject: &str, watchers: &[&str]) -> DatabaseProcessor {
        let db = DatabaseProcessor {
            pool: memory_pool().await,
        };
        for watcher in watchers {
            db.process(AddSubscription {
                subscriber_id: watcher.to_string(),
                watched_address: subject.to_string(),
            })
            .await
            .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn one_message_per_matching_subscription() {
        let db = db_with_watchers("alice.testnet", &["tg1", "tg2"]).await;
        let notifier = RecordingNotifier::default();

        let report = dispatch_event(&db, &notifier, &event_for("alice.testnet"))
            .await
            .unwrap();
        assert_eq!(report.matched, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("100 USDC"));
        assert!(sent[0].1.contains("50 wNEAR"));
    }

    #[tokio::test]
    async fn empty_match_set_is_a_no_op() {
        let db = db_with_watchers("alice.testnet", &["tg1"]).await;
        let notifier = RecordingNotifier::default();

        let report = dispatch_event(&db, &notifier, &event_for("bob.testnet"))
            .await
            .unwrap();
        assert_eq!(report, DispatchReport::default());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failed_delivery_does_not_block_the_rest() {
        let db = db_with_watchers("alice.testnet", &["tg1", "tg2", "tg3"]).await;
        let notifier = RecordingNotifier::default();
        *notifier.fail_for.lock().unwrap() = Some("tg2".to_string());

        let report = dispatch_event(&db, &notifier, &event_for("alice.testnet"))
            .await
            .unwrap();
        assert_eq!(report.matched, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);

        let sent = notifier.sent.lock().unwrap();
        let recipients: Vec<_> = sent.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(recipients, vec!["tg1", "tg3"]);
    }
}
