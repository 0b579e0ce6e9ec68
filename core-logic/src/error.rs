//! # Startup Error Types
//!
//! Everything in here is a configuration fault: the bot refuses to start
//! when one of these is raised. Faults that happen after startup are
//! reported per cycle by the bot crate and never end the process.

use thiserror::Error;

/// Fatal error raised while bringing the bot up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Interval bounds are inverted: min {min_secs}s > max {max_secs}s")]
    InvertedInterval { min_secs: u64, max_secs: u64 },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Signing key errors
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Private key not found in environment variable '{key}'")]
    MissingKey { key: String },

    #[error("Invalid private key format: expected hex string")]
    InvalidKeyFormat,

    #[error("Private key has wrong length: expected 64 hex chars, got {length}")]
    InvalidKeyLength { length: usize },
}

/// Errors reaching the chain during the startup health check
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Node at {endpoint} is unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Chain id mismatch: configured {expected}, node reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
}
