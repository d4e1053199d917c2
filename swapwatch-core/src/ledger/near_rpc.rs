//! NEAR JSON-RPC adapter for the [`LedgerClient`] port.
//!
//! `query` goes through the node's `call_function` view path. `invoke`
//! fetches the signer's access-key nonce and a recent block hash, builds
//! a borsh-serialized `FunctionCall` transaction, signs its sha256
//! digest with the configured ed25519 key and submits it via
//! `broadcast_tx_commit`. The execution trace is assembled from the
//! transaction outcome followed by the receipt outcomes, in node order.

use super::{ExecutionTrace, LedgerClient, LedgerError, Outcome};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use borsh::BorshSerialize;
use ed25519_dalek::{Signer as _, SigningKey};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

/// Network-facing settings for one deployment, built once at startup
/// and passed by reference into the adapter.
#[derive(Debug, Clone)]
pub struct NearConfig {
    /// JSON-RPC endpoint, e.g. `https://rpc.testnet.near.org`.
    pub rpc_url: Url,
    /// Account id of the contract being polled.
    pub contract_id: String,
    /// Account id the transactions are signed as.
    pub signer_account_id: String,
    /// `ed25519:<base58>` secret key as stored in NEAR credential files.
    pub secret_key: String,
}

pub struct NearRpcClient {
    config: NearConfig,
    signing_key: SigningKey,
    http: reqwest::Client,
}

impl NearRpcClient {
    pub fn new(config: NearConfig) -> Result<Self, LedgerError> {
        let signing_key = parse_secret_key(&config.secret_key)?;
        Ok(Self {
            config,
            signing_key,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        })
    }

    fn public_key_str(&self) -> String {
        format!(
            "ed25519:{}",
            bs58::encode(self.signing_key.verifying_key().to_bytes()).into_string()
        )
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, LedgerError> {
        #[derive(Deserialize)]
        struct RpcResponse<T> {
            result: Option<T>,
            error: Option<serde_json::Value>,
        }

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "swapwatch",
            "method": method,
            "params": params,
        });
        let response: RpcResponse<T> = self
            .http
            .post(self.config.rpc_url.clone())
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if let Some(error) = response.error {
            return Err(LedgerError::Rpc(error.to_string()));
        }
        response
            .result
            .ok_or_else(|| LedgerError::Response("missing result".to_string()))
    }

    /// Current access-key nonce and a recent block hash for the signer.
    async fn access_key(&self) -> Result<AccessKeyView, LedgerError> {
        self.rpc_call(
            "query",
            serde_json::json!({
                "request_type": "view_access_key",
                "finality": "final",
                "account_id": self.config.signer_account_id,
                "public_key": self.public_key_str(),
            }),
        )
        .await
    }

    fn sign_transaction(
        &self,
        nonce: u64,
        block_hash: [u8; 32],
        method: &str,
        args: &serde_json::Value,
        gas: u64,
        deposit: u128,
    ) -> Result<Vec<u8>, LedgerError> {
        let transaction = Transaction {
            signer_id: self.config.signer_account_id.clone(),
            public_key: Ed25519PublicKey(self.signing_key.verifying_key().to_bytes()),
            nonce,
            receiver_id: self.config.contract_id.clone(),
            block_hash,
            actions: vec![Action::function_call(method, args, gas, deposit)?],
        };
        let unsigned =
            borsh::to_vec(&transaction).map_err(|e| LedgerError::Response(e.to_string()))?;
        let digest = Sha256::digest(&unsigned);
        let signature = self.signing_key.sign(&digest);
        let signed = SignedTransaction {
            transaction,
            signature: signature.to_bytes(),
        };
        borsh::to_vec(&signed).map_err(|e| LedgerError::Response(e.to_string()))
    }
}

#[async_trait]
impl LedgerClient for NearRpcClient {
    async fn query(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError> {
        let args_bytes =
            serde_json::to_vec(&args).map_err(|e| LedgerError::Response(e.to_string()))?;
        let view: CallFunctionView = self
            .rpc_call(
                "query",
                serde_json::json!({
                    "request_type": "call_function",
                    "finality": "final",
                    "account_id": self.config.contract_id,
                    "method_name": method,
                    "args_base64": BASE64.encode(args_bytes),
                }),
            )
            .await?;
        serde_json::from_slice(&view.result).map_err(|e| LedgerError::Response(e.to_string()))
    }

    async fn invoke(
        &self,
        method: &str,
        args: serde_json::Value,
        gas: u64,
        deposit: u128,
    ) -> Result<ExecutionTrace, LedgerError> {
        let key = self.access_key().await?;
        let block_hash = decode_block_hash(&key.block_hash)?;
        let nonce = key.nonce + 1;
        let bytes = self.sign_transaction(nonce, block_hash, method, &args, gas, deposit)?;

        debug!(method, nonce, "Broadcasting transaction");
        let outcome: FinalExecutionOutcomeView = self
            .rpc_call(
                "broadcast_tx_commit",
                serde_json::json!([BASE64.encode(&bytes)]),
            )
            .await?;

        if let Some(failure) = outcome.status.get("Failure") {
            return Err(LedgerError::ExecutionFailed(failure.to_string()));
        }

        let mut outcomes = Vec::with_capacity(1 + outcome.receipts_outcome.len());
        outcomes.push(Outcome {
            id: outcome.transaction_outcome.id,
            logs: outcome.transaction_outcome.outcome.logs,
        });
        for receipt in outcome.receipts_outcome {
            outcomes.push(Outcome {
                id: receipt.id,
                logs: receipt.outcome.logs,
            });
        }
        Ok(ExecutionTrace {
            transaction_id: outcome.transaction.hash,
            outcomes,
        })
    }
}

fn parse_secret_key(raw: &str) -> Result<SigningKey, LedgerError> {
    let encoded = raw
        .strip_prefix("ed25519:")
        .ok_or_else(|| LedgerError::InvalidKey("expected an `ed25519:` key".to_string()))?;
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
    // NEAR credential files store seed followed by public key; a bare
    // 32-byte seed is accepted too.
    let seed: [u8; 32] = match bytes.len() {
        32 | 64 => <[u8; 32]>::try_from(&bytes[..32])
            .map_err(|_| LedgerError::InvalidKey("truncated key".to_string()))?,
        n => {
            return Err(LedgerError::InvalidKey(format!(
                "unexpected key length {n}"
            )));
        }
    };
    Ok(SigningKey::from_bytes(&seed))
}

fn decode_block_hash(raw: &str) -> Result<[u8; 32], LedgerError> {
    let bytes = bs58::decode(raw)
        .into_vec()
        .map_err(|e| LedgerError::Response(e.to_string()))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| LedgerError::Response(format!("block hash of length {}", bytes.len())))
}

// ---------------------------------------------------------------------------
// Transaction wire format (borsh)
// ---------------------------------------------------------------------------

/// NEAR transaction layout. Field order is part of the protocol; do not
/// reorder.
#[derive(BorshSerialize)]
struct Transaction {
    signer_id: String,
    public_key: Ed25519PublicKey,
    nonce: u64,
    receiver_id: String,
    block_hash: [u8; 32],
    actions: Vec<Action>,
}

/// Key-type tag 0 followed by the raw key bytes.
struct Ed25519PublicKey([u8; 32]);

impl BorshSerialize for Ed25519PublicKey {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        0u8.serialize(writer)?;
        writer.write_all(&self.0)
    }
}

/// The only action this client ever emits is `FunctionCall`
/// (discriminant 2 in the protocol's action enum).
struct Action {
    method_name: String,
    args: Vec<u8>,
    gas: u64,
    deposit: u128,
}

impl Action {
    fn function_call(
        method: &str,
        args: &serde_json::Value,
        gas: u64,
        deposit: u128,
    ) -> Result<Self, LedgerError> {
        let args = serde_json::to_vec(args).map_err(|e| LedgerError::Response(e.to_string()))?;
        Ok(Self {
            method_name: method.to_string(),
            args,
            gas,
            deposit,
        })
    }
}

impl BorshSerialize for Action {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        2u8.serialize(writer)?;
        self.method_name.serialize(writer)?;
        self.args.serialize(writer)?;
        self.gas.serialize(writer)?;
        self.deposit.serialize(writer)
    }
}

/// Signature-type tag 0 followed by the 64 signature bytes.
struct SignedTransaction {
    transaction: Transaction,
    signature: [u8; 64],
}

impl BorshSerialize for SignedTransaction {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        self.transaction.serialize(writer)?;
        0u8.serialize(writer)?;
        writer.write_all(&self.signature)
    }
}

// ---------------------------------------------------------------------------
// RPC response views
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AccessKeyView {
    nonce: u64,
    block_hash: String,
}

#[derive(Debug, Deserialize)]
struct CallFunctionView {
    result: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct FinalExecutionOutcomeView {
    status: serde_json::Value,
    transaction: TransactionView,
    transaction_outcome: OutcomeWithIdView,
    receipts_outcome: Vec<OutcomeWithIdView>,
}

#[derive(Debug, Deserialize)]
struct TransactionView {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct OutcomeWithIdView {
    id: String,
    outcome: OutcomeView,
}

#[derive(Debug, Deserialize)]
struct OutcomeView {
    logs: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_64_byte_credential_keys() {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&[7u8; 32]);
        let raw = format!("ed25519:{}", bs58::encode(bytes).into_string());
        let key = parse_secret_key(&raw).unwrap();
        assert_eq!(key.to_bytes(), [7u8; 32]);
    }

    #[test]
    fn rejects_foreign_key_types() {
        assert!(matches!(
            parse_secret_key("secp256k1:abc"),
            Err(LedgerError::InvalidKey(_))
        ));
        assert!(matches!(
            parse_secret_key(&format!("ed25519:{}", bs58::encode([1u8; 7]).into_string())),
            Err(LedgerError::InvalidKey(_))
        ));
    }

    #[test]
    fn block_hash_roundtrips_through_base58() {
        let hash = [9u8; 32];
        let encoded = bs58::encode(hash).into_string();
        assert_eq!(decode_block_hash(&encoded).unwrap(), hash);
        assert!(decode_block_hash("abc").is_err());
    }

    #[test]
    fn transaction_wire_layout_matches_protocol() {
        let transaction = Transaction {
            signer_id: "a".to_string(),
            public_key: Ed25519PublicKey([7u8; 32]),
            nonce: 1,
            receiver_id: "b".to_string(),
            block_hash: [9u8; 32],
            actions: vec![
                Action::function_call("swap", &serde_json::json!({}), 5, 1).unwrap(),
            ],
        };
        let bytes = borsh::to_vec(&transaction).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&1u32.to_le_bytes()); // signer_id length
        expected.push(b'a');
        expected.push(0); // ed25519 key-type tag
        expected.extend_from_slice(&[7u8; 32]);
        expected.extend_from_slice(&1u64.to_le_bytes()); // nonce
        expected.extend_from_slice(&1u32.to_le_bytes()); // receiver_id length
        expected.push(b'b');
        expected.extend_from_slice(&[9u8; 32]); // block hash
        expected.extend_from_slice(&1u32.to_le_bytes()); // one action
        expected.push(2); // FunctionCall discriminant
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice(b"swap");
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(b"{}");
        expected.extend_from_slice(&5u64.to_le_bytes()); // gas
        expected.extend_from_slice(&1u128.to_le_bytes()); // deposit

        assert_eq!(bytes, expected);
    }

    #[test]
    fn signed_transaction_appends_tagged_signature() {
        let transaction = Transaction {
            signer_id: "a".to_string(),
            public_key: Ed25519PublicKey([7u8; 32]),
            nonce: 1,
            receiver_id: "b".to_string(),
            block_hash: [9u8; 32],
            actions: Vec::new(),
        };
        let unsigned_len = borsh::to_vec(&transaction).unwrap().len();
        let signed = SignedTransaction {
            transaction,
            signature: [3u8; 64],
        };
        let bytes = borsh::to_vec(&signed).unwrap();
        assert_eq!(bytes.len(), unsigned_len + 1 + 64);
        assert_eq!(bytes[unsigned_len], 0); // ed25519 signature tag
        assert_eq!(&bytes[unsigned_len + 1..], &[3u8; 64]);
    }
}
