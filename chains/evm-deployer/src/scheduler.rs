//! The outer daemon loop as an explicit state machine.
//!
//! ```text
//! Idle -> InitialWait -> CycleRunning -> IntervalWait -> CycleRunning -> ...
//!                             |  \
//!                             |   -> NoContracts -> CycleRunning
//!                              -> Cooldown -> CycleRunning   (cycle fault)
//! ```

use crate::actions::{ActionReport, PostDeploymentActionRunner};
use crate::client::ChainClient;
use crate::compiler::ContractCompiler;
use crate::contracts::{ContractCatalog, ContractFile, ContractSource};
use crate::pipeline::{DeploymentOutcome, DeploymentPipeline};
use anyhow::{Context, Result};
use core_logic::{Clock, CycleStats, TimingConfig};
use ethers::types::Address;
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    InitialWait,
    CycleRunning,
    IntervalWait(Duration),
    /// Contract directory was empty; retry soon without counting a cycle.
    NoContracts,
    /// The last cycle faulted.
    Cooldown,
}

/// How one counted cycle ended.
#[derive(Debug, Clone)]
pub enum CycleReport {
    Deployed {
        file: ContractFile,
        address: Address,
        actions: ActionReport,
    },
    Failed {
        file: ContractFile,
        reason: String,
    },
    Skipped {
        file: ContractFile,
        reason: String,
    },
}

pub struct Scheduler<C, K, S, T> {
    pipeline: DeploymentPipeline<C, K>,
    runner: PostDeploymentActionRunner<C, T>,
    catalog: S,
    clock: Arc<T>,
    timing: TimingConfig,
    rng: StdRng,
    state: SchedulerState,
    stats: CycleStats,
    cycles_attempted: u64,
}

impl<C, K, S, T> Scheduler<C, K, S, T>
where
    C: ChainClient,
    K: ContractCompiler,
    S: ContractCatalog,
    T: Clock,
{
    pub fn new(
        pipeline: DeploymentPipeline<C, K>,
        runner: PostDeploymentActionRunner<C, T>,
        catalog: S,
        clock: Arc<T>,
        timing: TimingConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            pipeline,
            runner,
            catalog,
            clock,
            timing,
            rng,
            state: SchedulerState::Idle,
            stats: CycleStats::default(),
            cycles_attempted: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Cycles that picked a contract, whatever their outcome.
    pub fn cycles_attempted(&self) -> u64 {
        self.cycles_attempted
    }

    /// Never returns.
    pub async fn run_forever(&mut self) {
        loop {
            self.step().await;
        }
    }

    /// Performs the work of the current state and moves to the next one.
    pub async fn step(&mut self) -> SchedulerState {
        self.state = match self.state {
            SchedulerState::Idle => {
                info!(
                    "Initial wait for {:.2} hours before first deployment...",
                    hours(self.timing.initial_delay())
                );
                SchedulerState::InitialWait
            }
            SchedulerState::InitialWait => {
                self.clock.sleep(self.timing.initial_delay()).await;
                info!("Initial delay complete. Starting deployment cycle.");
                SchedulerState::CycleRunning
            }
            SchedulerState::CycleRunning => self.run_guarded_cycle().await,
            SchedulerState::IntervalWait(wait) => {
                self.clock.sleep(wait).await;
                SchedulerState::CycleRunning
            }
            SchedulerState::NoContracts => {
                self.clock.sleep(self.timing.empty_retry()).await;
                SchedulerState::CycleRunning
            }
            SchedulerState::Cooldown => {
                self.clock.sleep(self.timing.cooldown()).await;
                SchedulerState::CycleRunning
            }
        };
        self.state
    }

    async fn run_guarded_cycle(&mut self) -> SchedulerState {
        let started = Instant::now();
        let result = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;

        let fault = match result {
            Ok(Ok(Some(report))) => {
                self.record(&report, started.elapsed());
                let wait = self.timing.next_interval(&mut self.rng);
                info!(
                    "Next deployment in approximately {:.2} hours...",
                    hours(wait)
                );
                return SchedulerState::IntervalWait(wait);
            }
            Ok(Ok(None)) => {
                warn!(
                    "No Solidity files found. Retrying in {}s.",
                    self.timing.empty_retry_secs
                );
                return SchedulerState::NoContracts;
            }
            Ok(Err(e)) => format!("{:#}", e),
            Err(panic) => panic_message(panic.as_ref()),
        };

        self.stats.faults += 1;
        error!("An unexpected error occurred in the deployment cycle: {}", fault);
        info!("Retrying in {}s...", self.timing.cooldown_secs);
        SchedulerState::Cooldown
    }

    /// `Ok(None)` when there was nothing to deploy.
    async fn run_cycle(&mut self) -> Result<Option<CycleReport>> {
        let files = self.catalog.list()?;
        let Some(file) = files.choose(&mut self.rng).cloned() else {
            return Ok(None);
        };
        self.cycles_attempted += 1;

        info!("--- Deploying {} ({}) ---", file.file_name, file.kind);
        let text = self
            .catalog
            .read(&file)
            .with_context(|| format!("Cannot read {}", file.file_name))?;
        let source = ContractSource {
            file: file.clone(),
            text,
        };

        let report = match self.pipeline.deploy(&source, &mut self.rng).await? {
            DeploymentOutcome::Deployed(instance) => {
                info!(
                    "Successfully deployed {} to {:?}",
                    file.file_name, instance.address
                );
                let actions = if instance.kind.has_follow_up() {
                    self.runner.run(&instance, &mut self.rng).await
                } else {
                    ActionReport::default()
                };
                CycleReport::Deployed {
                    file,
                    address: instance.address,
                    actions,
                }
            }
            DeploymentOutcome::Skipped(reason) => CycleReport::Skipped {
                file,
                reason: reason.to_string(),
            },
            DeploymentOutcome::Failed(failure) => {
                warn!("Failed to deploy {}: {}", file.file_name, failure);
                CycleReport::Failed {
                    file,
                    reason: failure.to_string(),
                }
            }
        };
        Ok(Some(report))
    }

    fn record(&mut self, report: &CycleReport, elapsed: Duration) {
        let n = self.cycles_attempted;
        let line = match report {
            CycleReport::Deployed {
                file,
                address,
                actions,
            } => {
                self.stats.deployed += 1;
                if file.kind.has_follow_up() {
                    format!("SUCCESS [{}] {:?} | {}", file.file_name, address, actions)
                } else {
                    format!("SUCCESS [{}] {:?}", file.file_name, address)
                }
            }
            CycleReport::Failed { file, reason } => {
                self.stats.failed += 1;
                format!("FAILED [{}] {}", file.file_name, reason)
            }
            CycleReport::Skipped { file, reason } => {
                self.stats.skipped += 1;
                format!("SKIPPED [{}] {}", file.file_name, reason)
            }
        };

        let s = &self.stats;
        info!(
            target: "cycle_result",
            "[#{}] {} in {:.1}s | deployed {} / failed {} / skipped {} / faults {} ({:.0}% ok)",
            n,
            line,
            elapsed.as_secs_f64(),
            s.deployed,
            s.failed,
            s.skipped,
            s.faults,
            s.success_rate()
        );
    }
}

fn hours(d: Duration) -> f64 {
    d.as_secs_f64() / 3600.0
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}
