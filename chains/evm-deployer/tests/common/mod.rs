#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use core_logic::{Clock, GasConfig, RetryConfig};
use ethers::abi::{parse_abi, Token};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use evm_deployer::{
    ChainClient, CompileError, ContractArtifact, ContractCatalog, ContractCompiler, ContractFile,
    ContractSource, TransactionExecutor,
};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

pub fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(ONE_ETHER)
}

pub fn gwei(n: u64) -> U256 {
    U256::from(n) * U256::exp10(9)
}

/// How the next receipt request resolves.
#[derive(Debug, Clone)]
pub enum ReceiptPlan {
    Success { logs: Vec<Log> },
    /// Status 1 but no contract address even for a creation.
    SuccessWithoutAddress,
    Reverted,
    Timeout,
    PollError(String),
}

#[derive(Debug)]
pub struct MockState {
    pub balance: U256,
    pub nonce: u64,
    pub gas_price: U256,
    /// `None` makes estimation fail.
    pub estimate: Option<U256>,
    pub reject_sends: bool,
    pub sent: Vec<TypedTransaction>,
    pub nonce_reads: usize,
    /// Consumed front to back; empty means plain success.
    pub receipts: VecDeque<ReceiptPlan>,
    /// Keyed by 4-byte selector; a missing selector reverts the call.
    pub call_responses: HashMap<[u8; 4], Bytes>,
    pub call_errors: HashMap<[u8; 4], String>,
    pending: HashMap<TxHash, TypedTransaction>,
}

/// In-memory chain. Nonces advance only when a transaction is accepted.
pub struct MockChain {
    address: Address,
    pub state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(balance: U256) -> Self {
        Self {
            address: Address::repeat_byte(0x11),
            state: Mutex::new(MockState {
                balance,
                nonce: 0,
                gas_price: gwei(1),
                estimate: Some(U256::from(100_000)),
                reject_sends: false,
                sent: Vec::new(),
                nonce_reads: 0,
                receipts: VecDeque::new(),
                call_responses: HashMap::new(),
                call_errors: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }

    pub fn plan_receipts(&self, plans: impl IntoIterator<Item = ReceiptPlan>) {
        self.state.lock().unwrap().receipts.extend(plans);
    }

    pub fn respond(&self, signature: &str, tokens: &[Token]) {
        self.state
            .lock()
            .unwrap()
            .call_responses
            .insert(ethers::utils::id(signature), Bytes::from(ethers::abi::encode(tokens)));
    }

    pub fn fail_call(&self, signature: &str, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .call_errors
            .insert(ethers::utils::id(signature), reason.to_string());
    }

    pub fn sent(&self) -> Vec<TypedTransaction> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Selectors of every sent call, creations excluded.
    pub fn sent_selectors(&self) -> Vec<[u8; 4]> {
        self.sent()
            .iter()
            .filter(|tx| tx.to().is_some())
            .filter_map(|tx| tx.data().map(|d| selector_of(d)))
            .collect()
    }
}

pub fn selector_of(data: &Bytes) -> [u8; 4] {
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    selector
}

pub fn deployed_address(n: u64) -> Address {
    Address::from_low_u64_be(0xc0de_0000 + n)
}

#[async_trait]
impl ChainClient for MockChain {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance(&self) -> Result<U256> {
        Ok(self.state.lock().unwrap().balance)
    }

    async fn transaction_count(&self) -> Result<U256> {
        let mut state = self.state.lock().unwrap();
        state.nonce_reads += 1;
        Ok(U256::from(state.nonce))
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256> {
        self.state
            .lock()
            .unwrap()
            .estimate
            .ok_or_else(|| anyhow!("execution reverted during estimation"))
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes> {
        let data = tx.data().cloned().unwrap_or_default();
        if data.len() < 4 {
            return Err(anyhow!("call without selector"));
        }
        let selector = selector_of(&data);
        let state = self.state.lock().unwrap();
        if let Some(reason) = state.call_errors.get(&selector) {
            return Err(anyhow!("{}", reason.clone()));
        }
        state
            .call_responses
            .get(&selector)
            .cloned()
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn send_signed(&self, tx: TypedTransaction) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        if state.reject_sends {
            return Err(anyhow!("insufficient funds for gas * price + value"));
        }
        state.sent.push(tx.clone());
        state.nonce += 1;
        let hash = H256::from_low_u64_be(state.sent.len() as u64);
        state.pending.insert(hash, tx);
        Ok(hash)
    }

    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        _timeout: Duration,
    ) -> Result<Option<TransactionReceipt>> {
        let mut state = self.state.lock().unwrap();
        let tx = state
            .pending
            .remove(&hash)
            .ok_or_else(|| anyhow!("unknown transaction"))?;
        let index = state.sent.len() as u64;
        let plan = state
            .receipts
            .pop_front()
            .unwrap_or(ReceiptPlan::Success { logs: Vec::new() });

        let mut receipt = TransactionReceipt {
            transaction_hash: hash,
            status: Some(U64::from(1)),
            ..Default::default()
        };
        let is_creation = tx.to().is_none();
        match plan {
            ReceiptPlan::Success { logs } => {
                if is_creation {
                    receipt.contract_address = Some(deployed_address(index));
                }
                receipt.logs = logs;
            }
            ReceiptPlan::SuccessWithoutAddress => {}
            ReceiptPlan::Reverted => receipt.status = Some(U64::zero()),
            ReceiptPlan::Timeout => return Ok(None),
            ReceiptPlan::PollError(reason) => return Err(anyhow!(reason)),
        }
        Ok(Some(receipt))
    }
}

/// Compiler stub keyed by contract name.
pub struct MockCompiler {
    artifacts: HashMap<String, ContractArtifact>,
    failure: Option<CompileError>,
    calls: AtomicUsize,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self {
            artifacts: HashMap::new(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            failure: Some(CompileError::Failed {
                source_name: "Broken.sol".to_string(),
                messages: vec!["ParserError: Expected ';'".to_string()],
            }),
            ..Self::new()
        }
    }

    pub fn with_artifact(mut self, contract_name: &str, human_abi: &[&str]) -> Self {
        let abi = parse_abi(human_abi).unwrap();
        self.artifacts.insert(
            contract_name.to_string(),
            ContractArtifact {
                source_name: format!("{}.sol", contract_name),
                contract_name: contract_name.to_string(),
                bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40, 0x52]),
                abi,
            },
        );
        self
    }

    /// Artifacts for every sample contract.
    pub fn with_samples() -> Self {
        Self::new()
            .with_artifact("Greeter", GREETER_ABI)
            .with_artifact("SimpleTimeLock", TIMELOCK_ABI)
            .with_artifact("EventEmitter", &["function ping()"])
            .with_artifact("Owned", &["function owner() view returns (address)"])
            .with_artifact("EtherVault", &["function deposit() payable"])
            .with_artifact("ERC20Random", ERC20_ABI)
            .with_artifact("ERC721Random", ERC721_ABI)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub const GREETER_ABI: &[&str] = &[
    "constructor(string)",
    "function greet() view returns (string)",
];

pub const TIMELOCK_ABI: &[&str] = &["constructor(uint256)", "function release()"];

pub const ERC20_ABI: &[&str] = &[
    "constructor(string,string,uint256)",
    "function decimals() view returns (uint8)",
    "function symbol() view returns (string)",
    "function balanceOf(address) view returns (uint256)",
    "function transfer(address,uint256) returns (bool)",
];

pub const ERC721_ABI: &[&str] = &[
    "constructor(string,string)",
    "function mint(address) returns (uint256)",
    "function safeTransferFrom(address,address,uint256)",
];

#[async_trait]
impl ContractCompiler for MockCompiler {
    async fn compile(&self, source: &ContractSource) -> Result<ContractArtifact, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        let name = source.file.contract_name();
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::ContractMissing {
                source_name: source.file.file_name.clone(),
                contract: name.to_string(),
            })
    }
}

/// Returns immediately and remembers every requested duration.
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// What the in-memory catalog does on `list`.
pub enum CatalogMode {
    Files(Vec<&'static str>),
    ListError,
    PanicOnRead(Vec<&'static str>),
}

pub struct MemoryCatalog {
    pub mode: CatalogMode,
}

impl MemoryCatalog {
    pub fn files(names: Vec<&'static str>) -> Self {
        Self {
            mode: CatalogMode::Files(names),
        }
    }
}

impl ContractCatalog for MemoryCatalog {
    fn list(&self) -> Result<Vec<ContractFile>> {
        let names = match &self.mode {
            CatalogMode::Files(names) | CatalogMode::PanicOnRead(names) => names,
            CatalogMode::ListError => return Err(anyhow!("contracts directory vanished")),
        };
        Ok(names
            .iter()
            .filter_map(|n| ContractFile::new(PathBuf::from("contracts").join(n)))
            .collect())
    }

    fn read(&self, file: &ContractFile) -> Result<String> {
        if let CatalogMode::PanicOnRead(_) = self.mode {
            panic!("simulated fault reading {}", file.file_name);
        }
        Ok(format!("contract {} {{}}", file.contract_name()))
    }
}

pub fn source(file_name: &str) -> ContractSource {
    let file = ContractFile::new(PathBuf::from("contracts").join(file_name)).unwrap();
    ContractSource {
        text: format!("contract {} {{}}", file.contract_name()),
        file,
    }
}

/// Executor without read retries so failing reads surface immediately.
pub fn executor(chain: Arc<MockChain>) -> TransactionExecutor<MockChain> {
    TransactionExecutor::new(chain, GasConfig::default())
        .with_retry_config(RetryConfig::new(0, 1).without_jitter())
}
