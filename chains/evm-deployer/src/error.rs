//! Per-cycle failure types. None of these ever terminates the process;
//! the scheduler logs them and moves on.

use ethers::types::{TxHash, U256};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("Compiler unavailable: {reason}")]
    CompilerUnavailable { reason: String },

    #[error("Compilation of {source_name} failed: {messages:?}")]
    Failed {
        source_name: String,
        messages: Vec<String>,
    },

    #[error("Contract '{contract}' not found in compiler output for {source_name}")]
    ContractMissing {
        source_name: String,
        contract: String,
    },

    #[error("Compiler output for '{contract}' has no {what}")]
    IncompleteOutput { contract: String, what: &'static str },
}

/// Why a single transaction did not end in a successful receipt.
#[derive(Error, Debug, Clone)]
pub enum TransactionError {
    /// Nonce or gas price could not be read; nothing was broadcast.
    #[error("Could not prepare transaction: {reason}")]
    Preparation { reason: String },

    #[error("Broadcast rejected: {reason}")]
    Rejected { reason: String },

    #[error("Transaction {hash:?} reverted (status {status})")]
    Reverted { hash: TxHash, status: u64 },

    /// The transaction may still land; treat as unknown, not as "never happened".
    #[error("No receipt for {hash:?} within {timeout_secs}s (outcome unknown)")]
    ConfirmationTimeout { hash: TxHash, timeout_secs: u64 },

    #[error("Receipt polling for {hash:?} failed: {reason}")]
    ReceiptUnavailable { hash: TxHash, reason: String },
}

impl TransactionError {
    /// True when the transaction might have been included despite the error.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            TransactionError::ConfirmationTimeout { .. }
                | TransactionError::ReceiptUnavailable { .. }
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum SkipReason {
    #[error("insufficient funds: balance {balance} wei < required {required} wei")]
    InsufficientFunds { balance: U256, required: U256 },
}
