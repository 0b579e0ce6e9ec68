//! # EVM Deployer
//!
//! Unattended contract deployment bot. Each cycle picks a Solidity file,
//! compiles it, deploys it with synthesized constructor arguments and, for
//! token contracts, runs a few transfers or mints against the new instance.
//!
//! - [`contracts`] - contract kinds and the source directory
//! - [`compiler`] - solc compilation to bytecode + ABI
//! - [`client`] - node RPC and local signing
//! - [`executor`] - one intent to one confirmed (or failed) transaction
//! - [`pipeline`] - compile, encode, deploy
//! - [`actions`] - post-deployment token/NFT calls
//! - [`scheduler`] - the forever loop

pub mod actions;
pub mod client;
pub mod compiler;
pub mod config;
pub mod contracts;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod scheduler;
pub mod utils;

pub use actions::{ActionReport, ActionSettings, PostDeploymentActionRunner};
pub use client::{ChainClient, EthersChainClient};
pub use compiler::{ContractArtifact, ContractCompiler, SolcCompiler};
pub use config::DeployerConfig;
pub use contracts::{ContractCatalog, ContractDirectory, ContractFile, ContractKind, ContractSource};
pub use error::{CompileError, SkipReason, TransactionError};
pub use executor::{TransactionExecutor, TransactionIntent, TransactionOutcome};
pub use pipeline::{
    ArgumentSynthesizer, ConstructorPlan, DeployedInstance, DeploymentFailure, DeploymentOutcome,
    DeploymentPipeline,
};
pub use scheduler::{CycleReport, Scheduler, SchedulerState};
