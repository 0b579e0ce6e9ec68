use crate::error::{ConfigError, WalletError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_name")]
    pub name: String,
    pub rpc_url: String,
    /// When set, the node's reported chain id must match.
    #[serde(default)]
    pub chain_id: Option<u64>,
}

fn default_chain_name() -> String {
    "evm".to_string()
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.rpc_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "rpc_url".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidRpcUrl {
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

/// Where the deployer's private key comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WalletSource {
    Env { key: String },
    File { path: String },
}

impl Default for WalletSource {
    fn default() -> Self {
        WalletSource::Env {
            key: "PRIVATE_KEY".to_string(),
        }
    }
}

impl WalletSource {
    /// Reads the key and returns it as 64 lowercase-agnostic hex chars without `0x`.
    pub fn resolve(&self) -> Result<String, crate::StartupError> {
        let raw = match self {
            WalletSource::Env { key } => std::env::var(key)
                .map_err(|_| WalletError::MissingKey { key: key.clone() })?,
            WalletSource::File { path } => {
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
                    path: path.clone(),
                    msg: e.to_string(),
                })?
            }
        };
        Ok(normalize_private_key(&raw)?)
    }
}

pub fn normalize_private_key(raw: &str) -> Result<String, WalletError> {
    let trimmed = raw.trim();
    let key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex::decode(key).is_err() {
        return Err(WalletError::InvalidKeyFormat);
    }
    if key.len() != 64 {
        return Err(WalletError::InvalidKeyLength { length: key.len() });
    }
    Ok(key.to_string())
}

/// Scheduler timing constants, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: u64,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    #[serde(default = "default_empty_retry")]
    pub empty_retry_secs: u64,
}

fn default_initial_delay() -> u64 {
    24 * 3600
}

fn default_min_interval() -> u64 {
    3600
}

fn default_max_interval() -> u64 {
    6 * 3600
}

fn default_cooldown() -> u64 {
    300
}

fn default_empty_retry() -> u64 {
    60
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            min_interval_secs: default_min_interval(),
            max_interval_secs: default_max_interval(),
            cooldown_secs: default_cooldown(),
            empty_retry_secs: default_empty_retry(),
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_interval_secs > self.max_interval_secs {
            return Err(ConfigError::InvertedInterval {
                min_secs: self.min_interval_secs,
                max_secs: self.max_interval_secs,
            });
        }
        Ok(())
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn empty_retry(&self) -> Duration {
        Duration::from_secs(self.empty_retry_secs)
    }

    /// Uniform draw in `[min_interval, max_interval]` with millisecond resolution.
    pub fn next_interval<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min_ms = self.min_interval_secs.saturating_mul(1000);
        let max_ms = self.max_interval_secs.saturating_mul(1000).max(min_ms);
        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }
}
