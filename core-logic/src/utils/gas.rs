//! # Core Logic - Gas Configuration
//!
//! Gas and confirmation settings shared by every transaction the bot sends.
//! Configuration only; the chain crates do the actual estimation.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    /// Ceiling used when estimation fails, and for worst-case cost checks.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Added on top of a successful estimate.
    #[serde(default = "default_estimate_buffer")]
    pub estimate_buffer: u64,
    #[serde(default = "default_creation_timeout")]
    pub creation_timeout_secs: u64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub receipt_poll_ms: u64,
}

fn default_gas_limit() -> u64 {
    3_000_000
}

fn default_estimate_buffer() -> u64 {
    50_000
}

fn default_creation_timeout() -> u64 {
    600
}

fn default_call_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    3_000
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_limit: default_gas_limit(),
            estimate_buffer: default_estimate_buffer(),
            creation_timeout_secs: default_creation_timeout(),
            call_timeout_secs: default_call_timeout(),
            receipt_poll_ms: default_poll_interval(),
        }
    }
}

impl GasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_estimate_buffer(mut self, buffer: u64) -> Self {
        self.estimate_buffer = buffer;
        self
    }

    pub fn fallback_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn padded_limit(&self, estimate: u64) -> u64 {
        estimate.saturating_add(self.estimate_buffer)
    }

    /// How long to wait for a receipt; contract creation gets the longer window.
    pub fn receipt_timeout(&self, is_creation: bool) -> Duration {
        if is_creation {
            Duration::from_secs(self.creation_timeout_secs)
        } else {
            Duration::from_secs(self.call_timeout_secs)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms.max(1))
    }
}
