use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// A subscriber's registered interest in one watched account.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    /// Messaging identity (Telegram chat id, stored as text).
    pub subscriber_id: String,
    pub watched_address: String,
}

#[derive(Debug, Clone)]
/// Every subscription watching `address`. Exact string match; no casing
/// normalization is applied here or at registration time.
pub struct ListSubscriptionsByAddress {
    pub address: String,
}

impl Processor<ListSubscriptionsByAddress> for DatabaseProcessor {
    type Output = Vec<Subscription>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListSubscriptionsByAddress")]
    async fn process(
        &self,
        query: ListSubscriptionsByAddress,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, subscriber_id, watched_address
            FROM subscriptions
            WHERE watched_address = ?
            ORDER BY id ASC
            "#,
        )
        .bind(&query.address)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Register a (subscriber, address) pair.
///
/// Returns `false` when the pair already exists (the uniqueness
/// constraint swallows the insert).
pub struct AddSubscription {
    pub subscriber_id: String,
    pub watched_address: String,
}

impl Processor<AddSubscription> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AddSubscription")]
    async fn process(&self, insert: AddSubscription) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (subscriber_id, watched_address)
            VALUES (?, ?)
            ON CONFLICT (watched_address, subscriber_id) DO NOTHING
            "#,
        )
        .bind(&insert.subscriber_id)
        .bind(&insert.watched_address)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Remove a (subscriber, address) pair. Returns `false` when nothing
/// was being watched.
pub struct RemoveSubscription {
    pub subscriber_id: String,
    pub watched_address: String,
}

impl Processor<RemoveSubscription> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RemoveSubscription")]
    async fn process(&self, delete: RemoveSubscription) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM subscriptions
            WHERE subscriber_id = ? AND watched_address = ?
            "#,
        )
        .bind(&delete.subscriber_id)
        .bind(&delete.watched_address)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Every address one subscriber watches, for the `/list` command.
pub struct ListSubscriptionsBySubscriber {
    pub subscriber_id: String,
}

impl Processor<ListSubscriptionsBySubscriber> for DatabaseProcessor {
    type Output = Vec<Subscription>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListSubscriptionsBySubscriber")]
    async fn process(
        &self,
        query: ListSubscriptionsBySubscriber,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, subscriber_id, watched_address
            FROM subscriptions
            WHERE subscriber_id = ?
            ORDER BY watched_address ASC
            "#,
        )
        .bind(&query.subscriber_id)
        .fetch_all(&self.pool)
        .await
    }
}
