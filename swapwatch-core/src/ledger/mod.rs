//! Port to the remote ledger.
//!
//! The pipeline only ever needs two operations: a read-only contract
//! query and a state-changing invocation that yields the execution
//! trace. [`near_rpc`] provides the production adapter.

pub mod near_rpc;

use async_trait::async_trait;
use thiserror::Error;

/// One execution outcome (the top-level transaction or a receipt from a
/// nested cross-contract call), with the log lines it emitted in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub id: String,
    pub logs: Vec<String>,
}

/// Full record of effects produced by one state-changing invocation,
/// in the order the node reports them. Transient: consumed once by the
/// extractor and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTrace {
    pub transaction_id: String,
    pub outcomes: Vec<Outcome>,
}

/// Errors from the ledger boundary. All of them are recovered at the
/// scheduler: the cycle ends and the next one runs unaffected.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// HTTP transport failure
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error object
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node answered 200 but the payload was not what we expect
    #[error("malformed RPC response: {0}")]
    Response(String),

    /// The transaction was included but its execution failed
    #[error("contract execution failed: {0}")]
    ExecutionFailed(String),

    /// The configured signer key could not be parsed
    #[error("invalid signer key: {0}")]
    InvalidKey(String),
}

/// Read-only queries and state-changing calls against the contract.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Call a view method and decode its return value as JSON.
    async fn query(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError>;

    /// Call a state-changing method with a gas ceiling and an attached
    /// deposit (yoctoNEAR), returning the execution trace.
    async fn invoke(
        &self,
        method: &str,
        args: serde_json::Value,
        gas: u64,
        deposit: u128,
    ) -> Result<ExecutionTrace, LedgerError>;
}
