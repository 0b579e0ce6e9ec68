//! Contract files on disk and the closed set of contract shapes the bot knows.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Shape of a contract, decided once from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Greeter,
    TimeLock,
    EventEmitter,
    Owned,
    Vault,
    FungibleToken,
    NonFungibleToken,
    Unknown,
}

impl ContractKind {
    pub const KNOWN: [ContractKind; 7] = [
        ContractKind::Greeter,
        ContractKind::TimeLock,
        ContractKind::EventEmitter,
        ContractKind::Owned,
        ContractKind::Vault,
        ContractKind::FungibleToken,
        ContractKind::NonFungibleToken,
    ];

    pub fn from_file_name(file_name: &str) -> Self {
        match file_name {
            "Greeter.sol" => ContractKind::Greeter,
            "SimpleTimeLock.sol" => ContractKind::TimeLock,
            "EventEmitter.sol" => ContractKind::EventEmitter,
            "Owned.sol" => ContractKind::Owned,
            "EtherVault.sol" => ContractKind::Vault,
            "ERC20Random.sol" => ContractKind::FungibleToken,
            "ERC721Random.sol" => ContractKind::NonFungibleToken,
            _ => ContractKind::Unknown,
        }
    }

    /// Kinds whose constructor is payable and gets native value attached.
    pub fn carries_value(&self) -> bool {
        matches!(self, ContractKind::TimeLock)
    }

    pub fn has_follow_up(&self) -> bool {
        matches!(
            self,
            ContractKind::FungibleToken | ContractKind::NonFungibleToken
        )
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractKind::Greeter => "Greeter",
            ContractKind::TimeLock => "TimeLock",
            ContractKind::EventEmitter => "EventEmitter",
            ContractKind::Owned => "Owned",
            ContractKind::Vault => "Vault",
            ContractKind::FungibleToken => "ERC20",
            ContractKind::NonFungibleToken => "ERC721",
            ContractKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A selectable `.sol` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFile {
    pub file_name: String,
    pub path: PathBuf,
    pub kind: ContractKind,
}

impl ContractFile {
    pub fn new(path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let kind = ContractKind::from_file_name(&file_name);
        Some(Self {
            file_name,
            path,
            kind,
        })
    }

    /// Name of the contract inside the file, taken from the file stem.
    pub fn contract_name(&self) -> &str {
        self.file_name
            .split('.')
            .next()
            .unwrap_or(self.file_name.as_str())
    }
}

/// Source text of the contract picked for this cycle.
#[derive(Debug, Clone)]
pub struct ContractSource {
    pub file: ContractFile,
    pub text: String,
}

/// Filesystem boundary: where the candidate contracts come from.
pub trait ContractCatalog: Send + Sync {
    fn list(&self) -> Result<Vec<ContractFile>>;
    fn read(&self, file: &ContractFile) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct ContractDirectory {
    root: PathBuf,
}

impl ContractDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContractCatalog for ContractDirectory {
    fn list(&self) -> Result<Vec<ContractFile>> {
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list contracts in {:?}", self.root))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sol") {
                continue;
            }
            if let Some(file) = ContractFile::new(path) {
                files.push(file);
            }
        }
        // read_dir order is platform dependent
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(files)
    }

    fn read(&self, file: &ContractFile) -> Result<String> {
        std::fs::read_to_string(&file.path)
            .with_context(|| format!("Failed to read contract source {:?}", file.path))
    }
}
