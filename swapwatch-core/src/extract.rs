//! Marker-line extraction over execution traces.

use crate::entities::conversions::ConversionEvent;
use crate::ledger::ExecutionTrace;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

/// JSON payload the contract logs after the marker token.
#[derive(Debug, Deserialize)]
struct SwapLogRecord {
    user: String,
    source_amount: Decimal,
    target_amount: Decimal,
    source: String,
    target: String,
}

/// Walks `trace` and yields one [`ConversionEvent`] per well-formed
/// marker-prefixed log line, in outcome-then-line order, tagged with the
/// id of the outcome that emitted it.
///
/// Lines without the marker are ignored, so unrelated contract output is
/// forward-compatible. A marker line whose payload fails to decode is
/// logged and skipped without affecting sibling lines or outcomes. Pure
/// with respect to its inputs.
pub fn extract_conversions<'a>(
    trace: &'a ExecutionTrace,
    marker: &'a str,
) -> impl Iterator<Item = ConversionEvent> + 'a {
    trace.outcomes.iter().flat_map(move |outcome| {
        outcome.logs.iter().filter_map(move |line| {
            let payload = line.strip_prefix(marker)?.trim_start();
            match serde_json::from_str::<SwapLogRecord>(payload) {
                Ok(record) => Some(ConversionEvent {
                    transaction_id: outcome.id.clone(),
                    subject_address: record.user,
                    source_amount: record.source_amount,
                    target_amount: record.target_amount,
                    source_asset: record.source,
                    target_asset: record.target,
                }),
                Err(error) => {
                    warn!(outcome_id = %outcome.id, %error, "Dropping malformed swap log line");
                    None
                }
            }
        })
    })
}
