//! Build, sign, broadcast and confirm one transaction.

use crate::client::ChainClient;
use crate::error::TransactionError;
use anyhow::Result;
use core_logic::{with_retry, GasConfig, RetryConfig};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fully specified transaction, built fresh for every send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub from: Address,
    /// `None` creates a contract.
    pub to: Option<Address>,
    pub nonce: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub value: U256,
    pub payload: Bytes,
}

impl TransactionIntent {
    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }

    pub fn to_typed(&self) -> TypedTransaction {
        let mut request = TransactionRequest::new()
            .from(self.from)
            .nonce(self.nonce)
            .gas(self.gas_limit)
            .gas_price(self.gas_price)
            .value(self.value)
            .data(self.payload.clone());
        if let Some(to) = self.to {
            request = request.to(to);
        }
        request.into()
    }
}

/// What happened to one transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionOutcome {
    pub hash: Option<TxHash>,
    /// A receipt was observed.
    pub confirmed: bool,
    /// Receipt observed and its status is 1.
    pub success: bool,
    pub deployed_address: Option<Address>,
    pub logs: Vec<Log>,
    pub failure: Option<TransactionError>,
}

impl TransactionOutcome {
    fn failed(hash: Option<TxHash>, error: TransactionError) -> Self {
        Self {
            hash,
            failure: Some(error),
            ..Default::default()
        }
    }

    pub fn from_receipt(receipt: TransactionReceipt) -> Self {
        let status = receipt.status.map(|s| s.as_u64());
        let hash = receipt.transaction_hash;
        if status == Some(1) {
            Self {
                hash: Some(hash),
                confirmed: true,
                success: true,
                deployed_address: receipt.contract_address,
                logs: receipt.logs,
                failure: None,
            }
        } else {
            Self {
                hash: Some(hash),
                confirmed: true,
                success: false,
                deployed_address: None,
                logs: receipt.logs,
                failure: Some(TransactionError::Reverted {
                    hash,
                    status: status.unwrap_or(0),
                }),
            }
        }
    }

    /// True when the chain may hold the transaction even though we saw no success.
    pub fn is_ambiguous(&self) -> bool {
        self.failure
            .as_ref()
            .map(TransactionError::is_ambiguous)
            .unwrap_or(false)
    }
}

pub struct TransactionExecutor<C> {
    chain: Arc<C>,
    gas: GasConfig,
    retry: RetryConfig,
}

// Manual impl: `#[derive(Clone)]` would wrongly require `C: Clone`.
impl<C> Clone for TransactionExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            gas: self.gas.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<C: ChainClient> TransactionExecutor<C> {
    pub fn new(chain: Arc<C>, gas: GasConfig) -> Self {
        Self {
            chain,
            gas,
            retry: RetryConfig::new(3, 1000),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn gas_config(&self) -> &GasConfig {
        &self.gas
    }

    pub fn address(&self) -> Address {
        self.chain.address()
    }

    pub async fn gas_price(&self) -> Result<U256> {
        with_retry(&self.retry, "eth_gasPrice", || self.chain.gas_price()).await
    }

    pub async fn balance(&self) -> Result<U256> {
        with_retry(&self.retry, "eth_getBalance", || self.chain.balance()).await
    }

    pub async fn nonce(&self) -> Result<U256> {
        with_retry(&self.retry, "eth_getTransactionCount", || {
            self.chain.transaction_count()
        })
        .await
    }

    /// Read-only contract call, retried on transient RPC errors.
    pub async fn read(&self, target: Address, calldata: Bytes) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.chain.address())
            .to(target)
            .data(calldata)
            .into();
        with_retry(&self.retry, "eth_call", || self.chain.call(&tx)).await
    }

    /// Sends exactly one transaction and waits for its receipt.
    ///
    /// Never returns an error: every failure is folded into the outcome.
    pub async fn execute(
        &self,
        target: Option<Address>,
        payload: Bytes,
        value: U256,
    ) -> TransactionOutcome {
        let intent = match self.build_intent(target, payload, value).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Could not prepare transaction: {:#}", e);
                return TransactionOutcome::failed(
                    None,
                    TransactionError::Preparation {
                        reason: format!("{:#}", e),
                    },
                );
            }
        };

        let hash = match self.chain.send_signed(intent.to_typed()).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Transaction broadcast FAILED: {:#}", e);
                return TransactionOutcome::failed(
                    None,
                    TransactionError::Rejected {
                        reason: format!("{:#}", e),
                    },
                );
            }
        };
        info!("Transaction sent. TX Hash: {:?}", hash);

        let timeout = self.gas.receipt_timeout(intent.is_creation());
        info!(
            "Waiting for transaction receipt (up to {}s)...",
            timeout.as_secs()
        );

        match self.chain.wait_for_receipt(hash, timeout).await {
            Ok(Some(receipt)) => {
                let outcome = TransactionOutcome::from_receipt(receipt);
                if outcome.success {
                    info!("Transaction {:?} confirmed.", hash);
                } else if let Some(failure) = &outcome.failure {
                    warn!("Transaction FAILED on-chain: {}", failure);
                }
                outcome
            }
            Ok(None) => {
                let error = TransactionError::ConfirmationTimeout {
                    hash,
                    timeout_secs: timeout.as_secs(),
                };
                warn!("{}", error);
                TransactionOutcome::failed(Some(hash), error)
            }
            Err(e) => {
                let error = TransactionError::ReceiptUnavailable {
                    hash,
                    reason: format!("{:#}", e),
                };
                warn!("{}", error);
                TransactionOutcome::failed(Some(hash), error)
            }
        }
    }

    async fn build_intent(
        &self,
        target: Option<Address>,
        payload: Bytes,
        value: U256,
    ) -> Result<TransactionIntent> {
        let from = self.chain.address();
        let nonce = self.nonce().await?;
        let gas_price = self.gas_price().await?;

        let mut estimate_tx = TransactionRequest::new()
            .from(from)
            .value(value)
            .data(payload.clone());
        if let Some(to) = target {
            estimate_tx = estimate_tx.to(to);
        }
        let estimate_tx: TypedTransaction = estimate_tx.into();

        let gas_limit = match self.chain.estimate_gas(&estimate_tx).await {
            Ok(estimate) => {
                let padded = u64::try_from(estimate)
                    .map(|e| U256::from(self.gas.padded_limit(e)))
                    .unwrap_or(estimate);
                debug!("Gas estimate {} (+buffer = {})", estimate, padded);
                padded
            }
            Err(e) => {
                warn!(
                    "Could not estimate gas, using default limit {}: {:#}",
                    self.gas.fallback_limit(),
                    e
                );
                U256::from(self.gas.fallback_limit())
            }
        };

        Ok(TransactionIntent {
            from,
            to: target,
            nonce,
            gas_limit,
            gas_price,
            value,
            payload,
        })
    }
}
