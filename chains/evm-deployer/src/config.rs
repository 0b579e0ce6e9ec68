use crate::actions::ActionSettings;
use crate::compiler::DEFAULT_SOLC_VERSION;
use crate::pipeline::DEFAULT_GREETINGS;
use anyhow::Result;
use config::{Config, Environment, File, Map};
use core_logic::{ChainConfig, ConfigError, GasConfig, TimingConfig, WalletSource};
use serde::Deserialize;
use std::time::Duration;

/// Legacy variable the RPC URL may still be supplied through.
pub const LEGACY_RPC_ENV: &str = "WEB3_PROVIDER_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct DeployerConfig {
    pub chain: ChainConfig,
    #[serde(default)]
    pub wallet: WalletSource,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub actions: ActionConfig,
    #[serde(default = "default_contracts_dir")]
    pub contracts_dir: String,
    #[serde(default = "default_solc_version")]
    pub solc_version: String,
    /// Greeter constructor strings. Empty means the built-in list.
    #[serde(default)]
    pub greetings: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActionConfig {
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    #[serde(default = "default_pause_min")]
    pub pause_min_secs: u64,
    #[serde(default = "default_pause_max")]
    pub pause_max_secs: u64,
    #[serde(default = "default_token_amount_min")]
    pub token_amount_min: u64,
    #[serde(default = "default_token_amount_max")]
    pub token_amount_max: u64,
}

fn default_contracts_dir() -> String {
    "contracts".to_string()
}

fn default_solc_version() -> String {
    DEFAULT_SOLC_VERSION.to_string()
}

fn default_rounds() -> usize {
    3
}

fn default_pause_min() -> u64 {
    5
}

fn default_pause_max() -> u64 {
    15
}

fn default_token_amount_min() -> u64 {
    1
}

fn default_token_amount_max() -> u64 {
    10
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            pause_min_secs: default_pause_min(),
            pause_max_secs: default_pause_max(),
            token_amount_min: default_token_amount_min(),
            token_amount_max: default_token_amount_max(),
        }
    }
}

impl ActionConfig {
    pub fn to_settings(&self) -> ActionSettings {
        ActionSettings {
            rounds: self.rounds,
            pause_min: Duration::from_secs(self.pause_min_secs),
            pause_max: Duration::from_secs(self.pause_max_secs),
            token_amount_min: self.token_amount_min,
            token_amount_max: self.token_amount_max,
        }
    }
}

impl DeployerConfig {
    /// Layers, lowest priority first: `WEB3_PROVIDER_URL`, the TOML file at
    /// `path` (optional), `DEPLOYER_*` variables (`DEPLOYER_CHAIN__RPC_URL`).
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Same layering as [`DeployerConfig::load`], reading variables from `vars`
    /// instead of the process environment.
    pub fn load_with_env(path: &str, vars: Map<String, String>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(url) = vars.get(LEGACY_RPC_ENV) {
            builder = builder.set_default("chain.rpc_url", url.as_str())?;
        }

        let settings = builder
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("DEPLOYER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .build()?;

        let config: Self = settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;
        self.timing.validate()?;

        if self.gas.gas_limit == 0 {
            return Err(invalid("gas.gas_limit", "must be greater than zero"));
        }
        if self.actions.pause_min_secs > self.actions.pause_max_secs {
            return Err(invalid("actions.pause_min_secs", "exceeds pause_max_secs"));
        }
        if self.actions.token_amount_min == 0
            || self.actions.token_amount_min > self.actions.token_amount_max
        {
            return Err(invalid(
                "actions.token_amount_min",
                "must be at least 1 and not exceed token_amount_max",
            ));
        }
        if self.contracts_dir.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "contracts_dir".to_string(),
            });
        }
        Ok(())
    }

    pub fn greetings(&self) -> Vec<String> {
        if self.greetings.is_empty() {
            DEFAULT_GREETINGS.iter().map(|g| g.to_string()).collect()
        } else {
            self.greetings.clone()
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
