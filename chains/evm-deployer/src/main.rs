use anyhow::Result;
use clap::Parser;
use core_logic::{setup_logger, TokioClock};
use dotenv::dotenv;
use ethers::utils::parse_ether;
use evm_deployer::utils::{display_ether, PhraseGenerator};
use evm_deployer::{
    ArgumentSynthesizer, ChainClient, ContractDirectory, DeployerConfig, DeploymentPipeline,
    EthersChainClient, PostDeploymentActionRunner, Scheduler, SolcCompiler, TransactionExecutor,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/evm-deployer/config.toml")]
    config: String,
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_guard = setup_logger(&args.log_dir);
    dotenv().ok();

    if let Err(e) = run(args).await {
        error!("Startup failed: {:#}", e);
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    info!("Loading config from: {}", args.config);
    let config = DeployerConfig::load(&args.config)?;

    let private_key = config.wallet.resolve()?;
    let client = EthersChainClient::connect(
        &config.chain.rpc_url,
        &private_key,
        config.chain.chain_id,
        config.gas.poll_interval(),
    )
    .await?;
    info!(
        "Connected to {} (chain ID {})",
        config.chain.name,
        client.chain_id()
    );
    info!("Deployer address: {:?}", client.address());

    match client.balance().await {
        Ok(balance) => {
            info!("Deployer balance: {} ETH", display_ether(balance));
            if balance < parse_ether("0.001")? {
                warn!("Balance is below 0.001 ETH. Deployments will likely fail or be skipped.");
            }
        }
        Err(e) => warn!("Could not read deployer balance: {:#}", e),
    }

    let compiler = SolcCompiler::new(config.solc_version.clone());
    if let Err(e) = compiler.prepare().await {
        warn!("Compiler not ready yet, will retry on first compile: {}", e);
    }

    let chain = Arc::new(client);
    let clock = Arc::new(TokioClock);
    let executor = TransactionExecutor::new(chain, config.gas.clone());

    let pipeline = DeploymentPipeline::new(
        executor.clone(),
        Arc::new(compiler),
        ArgumentSynthesizer::new(config.greetings(), PhraseGenerator::default()),
    );
    let runner =
        PostDeploymentActionRunner::new(executor, clock.clone(), config.actions.to_settings());
    let catalog = ContractDirectory::new(&config.contracts_dir);
    if !catalog.root().is_dir() {
        warn!(
            "Contracts directory {:?} does not exist yet. Cycles will fail until it does.",
            catalog.root()
        );
    }

    let mut scheduler = Scheduler::new(
        pipeline,
        runner,
        catalog,
        clock,
        config.timing.clone(),
        StdRng::from_entropy(),
    );

    let signal_failed = tokio::select! {
        _ = scheduler.run_forever() => false,
        result = signal::ctrl_c() => match result {
            Ok(()) => {
                info!("Received Ctrl+C. Shutting down.");
                false
            }
            Err(e) => {
                error!("Unable to listen for shutdown signal: {}", e);
                true
            }
        },
    };
    if signal_failed {
        scheduler.run_forever().await;
    }

    let stats = scheduler.stats();
    info!(
        "Stopped after {} cycles: {} deployed, {} failed, {} skipped, {} faults",
        scheduler.cycles_attempted(),
        stats.deployed,
        stats.failed,
        stats.skipped,
        stats.faults
    );
    Ok(())
}
