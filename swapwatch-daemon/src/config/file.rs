//! TOML file configuration structures.
//!
//! These structs directly map to the `swapwatch.toml` file format.

use serde::{Deserialize, Serialize};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub network: NetworkConfig,
    pub signer: SignerConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint, e.g. "https://rpc.testnet.near.org".
    pub rpc_url: url::Url,
    /// Account id of the DCA contract.
    pub contract_id: String,
}

/// Signer configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Account id the swap transactions are signed as.
    pub account_id: String,
    /// `ed25519:<base58>` secret key as found in NEAR credential files.
    pub secret_key: String,
}

/// Pipeline configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_invoke_method")]
    pub invoke_method: String,
    /// Read-only capability check; omit to always invoke.
    #[serde(default)]
    pub precheck_method: Option<String>,
    #[serde(default = "default_gas")]
    pub gas: u64,
    /// yoctoNEAR attached to the call, as a decimal string.
    #[serde(default = "default_deposit")]
    pub deposit: String,
    #[serde(default = "default_log_marker")]
    pub log_marker: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            invoke_method: default_invoke_method(),
            precheck_method: None,
            gas: default_gas(),
            deposit: default_deposit(),
            log_marker: default_log_marker(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_invoke_method() -> String {
    "swap".to_string()
}

fn default_gas() -> u64 {
    swapwatch_core::processors::pipeline::DEFAULT_GAS
}

fn default_deposit() -> String {
    "1".to_string()
}

fn default_log_marker() -> String {
    "SWAP:".to_string()
}

/// Telegram configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Overridable for local bot-API servers.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    swapwatch_core::notify::telegram::TELEGRAM_API_BASE.to_string()
}

/// Store configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite URL; `DATABASE_URL` in the environment wins over this.
    #[serde(default)]
    pub database_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let toml_str = r#"
[network]
rpc_url = "https://rpc.testnet.near.org"
contract_id = "test.dca-near.testnet"

[signer]
account_id = "dca-near.testnet"
secret_key = "ed25519:abc123"

[pipeline]
poll_interval_secs = 60
precheck_method = "can_swap"
deposit = "1"

[telegram]
bot_token = "123:token"

[store]
database_url = "sqlite://swapwatch.db"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.network.contract_id, "test.dca-near.testnet");
        assert_eq!(config.pipeline.poll_interval_secs, 60);
        assert_eq!(config.pipeline.precheck_method.as_deref(), Some("can_swap"));
        assert_eq!(config.pipeline.invoke_method, "swap");
        assert_eq!(
            config.telegram.api_base,
            swapwatch_core::notify::telegram::TELEGRAM_API_BASE
        );
        assert_eq!(
            config.store.database_url.as_deref(),
            Some("sqlite://swapwatch.db")
        );
    }

    #[test]
    fn pipeline_section_is_optional() {
        let toml_str = r#"
[network]
rpc_url = "https://rpc.testnet.near.org"
contract_id = "test.dca-near.testnet"

[signer]
account_id = "dca-near.testnet"
secret_key = "ed25519:abc123"

[telegram]
bot_token = "123:token"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.poll_interval_secs, 300);
        assert_eq!(config.pipeline.gas, 300_000_000_000_000);
        assert_eq!(config.pipeline.deposit, "1");
        assert_eq!(config.pipeline.log_marker, "SWAP:");
        assert!(config.pipeline.precheck_method.is_none());
        assert!(config.store.database_url.is_none());
    }
}
