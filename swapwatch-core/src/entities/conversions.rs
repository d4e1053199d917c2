use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// One conversion observed in an execution trace.
///
/// Immutable once extracted: persisted exactly once, never updated or
/// deleted. `transaction_id` is the identifier of the outcome whose log
/// line carried the conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionEvent {
    pub transaction_id: String,
    pub subject_address: String,
    pub source_amount: Decimal,
    pub target_amount: Decimal,
    pub source_asset: String,
    pub target_asset: String,
}

#[derive(Debug, Clone)]
/// Append one observed conversion. Amounts are stored as decimal
/// strings to keep full precision in the TEXT columns.
pub struct RecordConversion {
    pub event: ConversionEvent,
}

impl Processor<RecordConversion> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordConversion")]
    async fn process(&self, insert: RecordConversion) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO conversions
                (transaction_id, subject_address, source_amount,
                 target_amount, source_asset, target_asset)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&insert.event.transaction_id)
        .bind(&insert.event.subject_address)
        .bind(insert.event.source_amount.to_string())
        .bind(insert.event.target_amount.to_string())
        .bind(&insert.event.source_asset)
        .bind(&insert.event.target_asset)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::memory_pool;

    fn sample_event() -> ConversionEvent {
        ConversionEvent {
            transaction_id: "r1".to_string(),
            subject_address: "alice.testnet".to_string(),
            source_amount: Decimal::from(100),
            target_amount: Decimal::from(50),
            source_asset: "USDC".to_string(),
            target_asset: "wNEAR".to_string(),
        }
    }

    #[tokio::test]
    async fn records_one_row_per_event() {
        let db = DatabaseProcessor {
            pool: memory_pool().await,
        };
        db.process(RecordConversion {
            event: sample_event(),
        })
        .await
        .unwrap();

        let (transaction_id, source_amount): (String, String) = sqlx::query_as(
            "SELECT transaction_id, source_amount FROM conversions WHERE subject_address = ?",
        )
        .bind("alice.testnet")
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(transaction_id, "r1");
        assert_eq!(source_amount, "100");
    }
}
