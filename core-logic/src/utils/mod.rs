//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.

pub(crate) mod gas;
pub(crate) mod logger;
pub(crate) mod retry;

pub use gas::GasConfig;
pub use logger::setup_logger;
