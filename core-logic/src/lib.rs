//! # Core Logic - Shared Utilities for the Deployment Bot
//!
//! Chain-agnostic building blocks used by the bot crates in `chains/`.
//!
//! ## Modules
//!
//! - [`config`] - Chain, wallet and timing configuration structures
//! - [`error`] - Typed startup errors with thiserror
//! - [`traits`] - Clock abstraction and cycle statistics
//! - [`utils`] - Logger, retry helpers, gas settings

pub mod config;
pub mod error;
pub mod traits;
pub(crate) mod utils;

pub use config::{ChainConfig, TimingConfig, WalletSource};
pub use error::{ConfigError, NetworkError, StartupError, WalletError};
pub use traits::{Clock, CycleStats, TokioClock};

pub use utils::{setup_logger, GasConfig};

pub use utils::retry::{is_transient_error, with_retry, RetryConfig};
