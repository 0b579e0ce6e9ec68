//! Compile → constructor args → creation transaction.

use crate::client::ChainClient;
use crate::compiler::{ContractArtifact, ContractCompiler};
use crate::contracts::{ContractKind, ContractSource};
use crate::error::{CompileError, SkipReason};
use crate::executor::{TransactionExecutor, TransactionOutcome};
use crate::utils::{display_ether, worst_case_cost, PhraseGenerator};
use anyhow::{Context, Result};
use ethers::abi::{Abi, Token};
use ethers::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_GREETINGS: [&str; 5] = [
    "Hello from Bot!",
    "Greetings!",
    "Test deployment!",
    "Random deploy!",
    "GM!",
];

/// Exclusive bounds of the TimeLock deposit: 0.0001 and 0.0005 ether in wei.
pub const TIMELOCK_MIN_WEI: u128 = 100_000_000_000_000;
pub const TIMELOCK_MAX_WEI: u128 = 500_000_000_000_000;

pub const LOCK_SECONDS_MIN: u64 = 60;
pub const LOCK_SECONDS_MAX: u64 = 300;
pub const SUPPLY_MIN: u64 = 1_000;
pub const SUPPLY_MAX: u64 = 100_000;

/// Constructor arguments and attached value for one deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorPlan {
    pub args: Vec<Token>,
    pub value: U256,
}

impl ConstructorPlan {
    pub fn empty() -> Self {
        Self {
            args: Vec::new(),
            value: U256::zero(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArgumentSynthesizer {
    greetings: Vec<String>,
    phrases: PhraseGenerator,
}

impl Default for ArgumentSynthesizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_GREETINGS.iter().map(|g| g.to_string()).collect(),
            PhraseGenerator::default(),
        )
    }
}

impl ArgumentSynthesizer {
    pub fn new(greetings: Vec<String>, phrases: PhraseGenerator) -> Self {
        Self { greetings, phrases }
    }

    pub fn synthesize<R: Rng + ?Sized>(&self, kind: ContractKind, rng: &mut R) -> ConstructorPlan {
        match kind {
            ContractKind::Greeter => {
                let greeting = self
                    .greetings
                    .choose(rng)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_GREETINGS[0].to_string());
                info!("Greeter constructor arg: '{}'", greeting);
                ConstructorPlan {
                    args: vec![Token::String(greeting)],
                    value: U256::zero(),
                }
            }
            ContractKind::TimeLock => {
                let lock_seconds = rng.gen_range(LOCK_SECONDS_MIN..=LOCK_SECONDS_MAX);
                let value = U256::from(rng.gen_range(TIMELOCK_MIN_WEI + 1..TIMELOCK_MAX_WEI));
                info!("SimpleTimeLock constructor arg: {} seconds", lock_seconds);
                info!("Amount of ETH to lock: {} ETH", display_ether(value));
                ConstructorPlan {
                    args: vec![Token::Uint(U256::from(lock_seconds))],
                    value,
                }
            }
            ContractKind::FungibleToken => {
                let name = format!("{} Token", self.phrases.phrase(2, rng));
                let symbol = self.phrases.symbol(rng);
                let supply = rng.gen_range(SUPPLY_MIN..=SUPPLY_MAX);
                info!(
                    "ERC20 Token: Name='{}', Symbol='{}', Supply={}",
                    name, symbol, supply
                );
                ConstructorPlan {
                    args: vec![
                        Token::String(name),
                        Token::String(symbol),
                        Token::Uint(U256::from(supply)),
                    ],
                    value: U256::zero(),
                }
            }
            ContractKind::NonFungibleToken => {
                let name = format!("{} NFT", self.phrases.phrase(2, rng));
                let symbol = format!("{}NFT", self.phrases.symbol(rng));
                info!("ERC721 NFT: Name='{}', Symbol='{}'", name, symbol);
                ConstructorPlan {
                    args: vec![Token::String(name), Token::String(symbol)],
                    value: U256::zero(),
                }
            }
            ContractKind::EventEmitter | ContractKind::Owned | ContractKind::Vault => {
                info!("{} takes no constructor arguments.", kind);
                ConstructorPlan::empty()
            }
            ContractKind::Unknown => {
                warn!("Unknown contract kind. Assuming no constructor arguments and no ETH value.");
                ConstructorPlan::empty()
            }
        }
    }
}

/// Everything needed for the creation transaction.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub artifact: ContractArtifact,
    pub constructor_args: Vec<Token>,
    pub value: U256,
}

impl DeploymentRequest {
    /// Bytecode followed by the ABI-encoded constructor arguments.
    pub fn creation_payload(&self) -> Result<Bytes> {
        match self.artifact.abi.constructor() {
            Some(constructor) => {
                let encoded = constructor
                    .encode_input(self.artifact.bytecode.to_vec(), &self.constructor_args)
                    .context("Constructor arguments do not match the ABI")?;
                Ok(Bytes::from(encoded))
            }
            None if self.constructor_args.is_empty() => Ok(self.artifact.bytecode.clone()),
            None => anyhow::bail!(
                "{} has no constructor but {} arguments were supplied",
                self.artifact.contract_name,
                self.constructor_args.len()
            ),
        }
    }
}

/// A contract this cycle deployed successfully.
#[derive(Debug, Clone)]
pub struct DeployedInstance {
    pub address: Address,
    pub abi: Abi,
    pub kind: ContractKind,
    pub source_name: String,
}

#[derive(Debug, Clone)]
pub enum DeploymentFailure {
    Compilation(CompileError),
    Encoding(String),
    Transaction(TransactionOutcome),
    /// Status 1 but the receipt carries no contract address.
    MissingAddress(TransactionOutcome),
}

impl fmt::Display for DeploymentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentFailure::Compilation(e) => write!(f, "compilation error: {}", e),
            DeploymentFailure::Encoding(e) => write!(f, "constructor encoding error: {}", e),
            DeploymentFailure::Transaction(outcome) => match &outcome.failure {
                Some(err) => write!(f, "{}", err),
                None => write!(f, "transaction failed"),
            },
            DeploymentFailure::MissingAddress(outcome) => write!(
                f,
                "receipt {:?} has no contract address",
                outcome.hash.unwrap_or_default()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeploymentOutcome {
    Deployed(DeployedInstance),
    Skipped(SkipReason),
    Failed(DeploymentFailure),
}

pub struct DeploymentPipeline<C, K> {
    executor: TransactionExecutor<C>,
    compiler: Arc<K>,
    synthesizer: ArgumentSynthesizer,
}

impl<C: ChainClient, K: ContractCompiler> DeploymentPipeline<C, K> {
    pub fn new(
        executor: TransactionExecutor<C>,
        compiler: Arc<K>,
        synthesizer: ArgumentSynthesizer,
    ) -> Self {
        Self {
            executor,
            compiler,
            synthesizer,
        }
    }

    pub fn executor(&self) -> &TransactionExecutor<C> {
        &self.executor
    }

    /// Synthesizes constructor arguments for `source`'s kind, then deploys.
    ///
    /// `Err` is reserved for unexpected faults (e.g. the node going away during
    /// the funds check); ordinary failures come back as `DeploymentOutcome`.
    pub async fn deploy<R: Rng + ?Sized>(
        &self,
        source: &ContractSource,
        rng: &mut R,
    ) -> Result<DeploymentOutcome> {
        let plan = self.synthesizer.synthesize(source.file.kind, rng);
        self.deploy_with_plan(source, plan).await
    }

    pub async fn deploy_with_plan(
        &self,
        source: &ContractSource,
        plan: ConstructorPlan,
    ) -> Result<DeploymentOutcome> {
        let kind = source.file.kind;

        if kind.carries_value() || !plan.value.is_zero() {
            if let Some(reason) = self.check_funds(plan.value).await? {
                warn!(
                    "Insufficient funds for {} deployment: {}. Skipping this deployment.",
                    source.file.file_name, reason
                );
                return Ok(DeploymentOutcome::Skipped(reason));
            }
        }

        let artifact = match self.compiler.compile(source).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(
                    "Skipping deployment of {} due to compilation error: {}",
                    source.file.file_name, e
                );
                return Ok(DeploymentOutcome::Failed(DeploymentFailure::Compilation(e)));
            }
        };

        let request = DeploymentRequest {
            artifact,
            constructor_args: plan.args,
            value: plan.value,
        };
        let payload = match request.creation_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot encode deployment of {}: {:#}", source.file.file_name, e);
                return Ok(DeploymentOutcome::Failed(DeploymentFailure::Encoding(
                    format!("{:#}", e),
                )));
            }
        };

        info!("Sending deployment transaction for {}...", source.file.file_name);
        let outcome = self.executor.execute(None, payload, request.value).await;

        if !outcome.success {
            self.log_nonce_after_failure().await;
            return Ok(DeploymentOutcome::Failed(DeploymentFailure::Transaction(
                outcome,
            )));
        }

        match outcome.deployed_address {
            Some(address) => {
                info!("Contract successfully deployed to: {:?}", address);
                Ok(DeploymentOutcome::Deployed(DeployedInstance {
                    address,
                    abi: request.artifact.abi,
                    kind,
                    source_name: request.artifact.source_name,
                }))
            }
            None => Ok(DeploymentOutcome::Failed(DeploymentFailure::MissingAddress(
                outcome,
            ))),
        }
    }

    /// `Some(reason)` when the balance cannot cover value plus worst-case gas.
    async fn check_funds(&self, value: U256) -> Result<Option<SkipReason>> {
        let gas_price = self
            .executor
            .gas_price()
            .await
            .context("Gas price unavailable for funds check")?;
        let balance = self
            .executor
            .balance()
            .await
            .context("Balance unavailable for funds check")?;

        let gas_cost = worst_case_cost(self.executor.gas_config().gas_limit, gas_price);
        let required = value.saturating_add(gas_cost);
        if balance < required {
            return Ok(Some(SkipReason::InsufficientFunds { balance, required }));
        }
        Ok(None)
    }

    async fn log_nonce_after_failure(&self) {
        match self.executor.nonce().await {
            Ok(nonce) => info!(
                "Current nonce for {:?}: {}",
                self.executor.address(),
                nonce
            ),
            Err(e) => warn!("Could not read nonce after failed deployment: {:#}", e),
        }
    }
}
