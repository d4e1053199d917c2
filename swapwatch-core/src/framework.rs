use sqlx::SqlitePool;

/// Executes query objects against the store.
///
/// Every store access in the crate goes through a
/// `kanau::processor::Processor` impl on this type, which keeps all SQL
/// parameterized in a single layer.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: SqlitePool,
}
