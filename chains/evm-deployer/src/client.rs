//! Chain RPC boundary.
//!
//! [`ChainClient`] is everything the bot needs from a node plus the signing
//! identity. [`EthersChainClient`] is the production implementation backed by
//! an ethers HTTP provider and a local wallet; tests swap in an in-memory chain.

use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::{NetworkError, StartupError};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the signing identity.
    fn address(&self) -> Address;

    async fn balance(&self) -> Result<U256>;

    /// Pending transaction count of the signing identity.
    async fn transaction_count(&self) -> Result<U256>;

    async fn gas_price(&self) -> Result<U256>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256>;

    /// Read-only `eth_call` against the latest state.
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes>;

    /// Signs locally and broadcasts the raw transaction.
    async fn send_signed(&self, tx: TypedTransaction) -> Result<TxHash>;

    /// Polls for a receipt; `Ok(None)` means the timeout elapsed first.
    /// `Err` means the node stopped answering the poll, so the outcome of
    /// the transaction is unknown.
    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        timeout: Duration,
    ) -> Result<Option<TransactionReceipt>>;
}

/// Failed receipt polls in a row after which the wait is abandoned.
pub const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 5;

/// Calls `fetch` every `interval` until it yields a value or `timeout`
/// elapses. Isolated failures are tolerated; `max_errors` in a row end the
/// wait with the last error.
pub(crate) async fn poll_until<T, F, Fut>(
    mut fetch: F,
    interval: Duration,
    timeout: Duration,
    max_errors: u32,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let poll = async {
        let mut errors = 0;
        loop {
            match fetch().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => errors = 0,
                Err(e) => {
                    errors += 1;
                    if errors >= max_errors {
                        return Err(e.context(format!("{} consecutive polls failed", errors)));
                    }
                    debug!("Poll failed ({}/{}): {}", errors, max_errors, e);
                }
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(result) => result.map(Some),
        Err(_) => Ok(None),
    }
}

#[derive(Clone, Debug)]
pub struct EthersChainClient {
    provider: Provider<Http>,
    wallet: LocalWallet,
    chain_id: u64,
    poll_interval: Duration,
}

impl EthersChainClient {
    /// Connects to `rpc_url`, checks the node answers and binds the wallet to
    /// its chain id. Any failure here is a startup fault.
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        expected_chain_id: Option<u64>,
        poll_interval: Duration,
    ) -> Result<Self, StartupError> {
        let provider = Provider::<Http>::try_from(rpc_url).map_err(|_| {
            core_logic::ConfigError::InvalidRpcUrl {
                url: rpc_url.to_string(),
            }
        })?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| NetworkError::Unreachable {
                endpoint: rpc_url.to_string(),
                reason: e.to_string(),
            })?
            .as_u64();

        if let Some(expected) = expected_chain_id {
            if expected != chain_id {
                return Err(NetworkError::ChainIdMismatch {
                    expected,
                    actual: chain_id,
                }
                .into());
            }
        }

        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|_| core_logic::WalletError::InvalidKeyFormat)?
            .with_chain_id(chain_id);

        Ok(Self {
            provider,
            wallet,
            chain_id,
            poll_interval,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn balance(&self) -> Result<U256> {
        self.provider
            .get_balance(self.wallet.address(), None)
            .await
            .context("eth_getBalance failed")
    }

    async fn transaction_count(&self) -> Result<U256> {
        self.provider
            .get_transaction_count(self.wallet.address(), Some(BlockNumber::Pending.into()))
            .await
            .context("eth_getTransactionCount failed")
    }

    async fn gas_price(&self) -> Result<U256> {
        self.provider
            .get_gas_price()
            .await
            .context("eth_gasPrice failed")
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
        self.provider
            .estimate_gas(tx, None)
            .await
            .context("eth_estimateGas failed")
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes> {
        self.provider
            .call(tx, None)
            .await
            .context("eth_call failed")
    }

    async fn send_signed(&self, mut tx: TypedTransaction) -> Result<TxHash> {
        tx.set_chain_id(self.chain_id);
        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .context("Local signing failed")?;
        let raw = tx.rlp_signed(&signature);

        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .context("eth_sendRawTransaction failed")?;
        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        timeout: Duration,
    ) -> Result<Option<TransactionReceipt>> {
        poll_until(
            || async move {
                self.provider
                    .get_transaction_receipt(hash)
                    .await
                    .with_context(|| format!("eth_getTransactionReceipt for {:?} failed", hash))
            },
            self.poll_interval,
            timeout,
            MAX_CONSECUTIVE_POLL_ERRORS,
        )
        .await
    }
}
