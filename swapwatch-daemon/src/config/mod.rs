//! Configuration for swapwatch-daemon.
//!
//! Loads the TOML file, validates it and converts it into the explicit
//! config structs the core adapters take by reference. The database URL
//! can be overridden through the `DATABASE_URL` environment variable.

pub mod file;

use crate::config::file::{FileConfig, StoreConfig, TelegramConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use swapwatch_core::ledger::near_rpc::NearConfig;
use swapwatch_core::processors::PipelineConfig;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub near: NearConfig,
    pub pipeline: PipelineConfig,
    pub poll_interval: Duration,
    pub telegram: TelegramConfig,
    pub store: StoreConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Read the TOML file, validate it and build the loaded config.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        validate(&file_config)?;
        build_loaded_config(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.network.contract_id.is_empty() {
        return Err(ConfigError::Validation(
            "network.contract_id must not be empty".to_string(),
        ));
    }
    if config.signer.account_id.is_empty() {
        return Err(ConfigError::Validation(
            "signer.account_id must not be empty".to_string(),
        ));
    }
    if !config.signer.secret_key.starts_with("ed25519:") {
        return Err(ConfigError::Validation(
            "signer.secret_key must be an `ed25519:` key".to_string(),
        ));
    }
    if config.pipeline.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "pipeline.poll_interval_secs must be nonzero".to_string(),
        ));
    }
    if config.telegram.bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let deposit: u128 = file_config.pipeline.deposit.parse().map_err(|_| {
        ConfigError::Validation(format!(
            "pipeline.deposit is not a yoctoNEAR amount: {}",
            file_config.pipeline.deposit
        ))
    })?;

    Ok(LoadedConfig {
        near: NearConfig {
            rpc_url: file_config.network.rpc_url,
            contract_id: file_config.network.contract_id,
            signer_account_id: file_config.signer.account_id,
            secret_key: file_config.signer.secret_key,
        },
        pipeline: PipelineConfig {
            invoke_method: file_config.pipeline.invoke_method,
            precheck_method: file_config.pipeline.precheck_method,
            gas: file_config.pipeline.gas,
            deposit,
            log_marker: file_config.pipeline.log_marker,
        },
        poll_interval: Duration::from_secs(file_config.pipeline.poll_interval_secs),
        telegram: file_config.telegram,
        store: file_config.store,
    })
}

/// Resolve the store URL: environment wins, then the config file, then
/// a file next to the daemon.
pub fn get_database_url(loaded: &LoadedConfig) -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .or_else(|| loaded.store.database_url.clone())
        .unwrap_or_else(|| "sqlite://swapwatch.db".to_string())
}
