//! Ledger configuration.
//!
//! Loaded once from a JSON file (missing keys fall back to defaults) and
//! passed explicitly to the ledger and the log setup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Network chain id.
    pub chain_id: u64,
    /// Log file path; logs go to stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Maximum level: trace, debug, info, warn, error or off.
    pub log_level: String,
    /// Maximum transactions per block.
    pub max_transactions_per_block: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            log_file: None,
            log_level: "info".to_string(),
            max_transactions_per_block: 1000,
        }
    }
}

impl ChainConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id == 0 {
            return Err(ConfigError::Invalid("chain_id must be positive".into()));
        }
        if self.max_transactions_per_block == 0 {
            return Err(ConfigError::Invalid(
                "max_transactions_per_block must be positive".into(),
            ));
        }
        if self.log_level.parse::<tracing_subscriber::filter::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level: {}",
                self.log_level
            )));
        }
        Ok(())
    }
}
