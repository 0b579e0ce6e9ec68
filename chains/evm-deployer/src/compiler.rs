use crate::contracts::ContractSource;
use crate::error::CompileError;
use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::types::Bytes;
use ethers_solc::artifacts::{Source, Sources};
use ethers_solc::{CompilerInput, Solc};
use semver::Version;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub const DEFAULT_SOLC_VERSION: &str = "0.8.0";
pub const DEFAULT_OPTIMIZER_RUNS: usize = 200;

/// Creation bytecode and ABI of one compiled contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub source_name: String,
    pub contract_name: String,
    pub bytecode: Bytes,
    pub abi: Abi,
}

#[async_trait]
pub trait ContractCompiler: Send + Sync {
    async fn compile(&self, source: &ContractSource) -> Result<ContractArtifact, CompileError>;
}

/// solc via ethers-solc, pinned to one version with the optimizer on.
pub struct SolcCompiler {
    version: String,
    optimizer_runs: usize,
    solc: OnceCell<(Solc, Version)>,
}

impl SolcCompiler {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            optimizer_runs: DEFAULT_OPTIMIZER_RUNS,
            solc: OnceCell::new(),
        }
    }

    pub fn with_optimizer_runs(mut self, runs: usize) -> Self {
        self.optimizer_runs = runs;
        self
    }

    /// Standard JSON input for one source file. The EVM target is capped at
    /// the newest fork `version` understands.
    pub(crate) fn compiler_input(
        &self,
        source: &ContractSource,
        version: &Version,
    ) -> Result<CompilerInput, CompileError> {
        let source_name = source.file.file_name.clone();
        let mut sources: Sources = BTreeMap::new();
        sources.insert(PathBuf::from(&source_name), Source::new(source.text.clone()));

        let mut input = CompilerInput::with_sources(sources)
            .pop()
            .ok_or_else(|| CompileError::Failed {
                source_name,
                messages: vec!["no Solidity input produced".to_string()],
            })?;
        input.settings.optimizer.enable();
        input.settings.optimizer.runs(self.optimizer_runs);
        Ok(input.normalize_evm_version(version))
    }

    /// Installs or locates the compiler up front so the first cycle does not pay for it.
    pub async fn prepare(&self) -> Result<(), CompileError> {
        self.solc().await.map(|_| ())
    }

    async fn solc(&self) -> Result<&(Solc, Version), CompileError> {
        self.solc
            .get_or_try_init(|| {
                let version = self.version.clone();
                async move {
                    tokio::task::spawn_blocking(move || resolve_solc(&version))
                        .await
                        .map_err(|e| CompileError::CompilerUnavailable {
                            reason: e.to_string(),
                        })?
                }
            })
            .await
    }
}

/// Locates solc and the version it reports. The reported version decides the
/// EVM target, so a system binary other than the pinned one still gets valid input.
fn resolve_solc(version: &str) -> Result<(Solc, Version), CompileError> {
    match Solc::find_or_install_svm_version(version) {
        Ok(solc) => {
            info!("Using solc {} from svm", version);
            let reported = match solc.version() {
                Ok(reported) => reported,
                Err(e) => {
                    warn!("solc did not report its version ({}), assuming {}", e, version);
                    Version::parse(version).map_err(|e| CompileError::CompilerUnavailable {
                        reason: format!("invalid solc version '{}': {}", version, e),
                    })?
                }
            };
            Ok((solc, reported))
        }
        Err(svm_err) => {
            warn!(
                "Could not install solc {} via svm ({}). Falling back to system 'solc'.",
                version, svm_err
            );
            let system = Solc::default();
            match system.version() {
                Ok(found) => {
                    info!("System solc {} found in PATH", found);
                    Ok((system, found))
                }
                Err(e) => Err(CompileError::CompilerUnavailable {
                    reason: format!("svm: {}; system solc: {}", svm_err, e),
                }),
            }
        }
    }
}

#[async_trait]
impl ContractCompiler for SolcCompiler {
    async fn compile(&self, source: &ContractSource) -> Result<ContractArtifact, CompileError> {
        let (solc, version) = self.solc().await?.clone();
        let source_name = source.file.file_name.clone();
        let contract_name = source.file.contract_name().to_string();
        info!("Compiling {}...", source_name);

        let input = self.compiler_input(source, &version)?;

        let output = tokio::task::spawn_blocking(move || solc.compile(&input))
            .await
            .map_err(|e| CompileError::CompilerUnavailable {
                reason: e.to_string(),
            })?
            .map_err(|e| CompileError::Failed {
                source_name: source_name.clone(),
                messages: vec![e.to_string()],
            })?;

        if output.has_error() {
            let messages = output
                .errors
                .iter()
                .filter(|e| e.severity.is_error())
                .map(|e| e.message.clone())
                .collect();
            return Err(CompileError::Failed {
                source_name,
                messages,
            });
        }

        let compiled = output
            .find(&contract_name)
            .ok_or_else(|| CompileError::ContractMissing {
                source_name: source_name.clone(),
                contract: contract_name.clone(),
            })?;

        let abi = compiled
            .abi
            .cloned()
            .ok_or_else(|| CompileError::IncompleteOutput {
                contract: contract_name.clone(),
                what: "ABI",
            })?;
        let bytecode = compiled
            .bin
            .and_then(|bin| bin.as_bytes())
            .cloned()
            .ok_or_else(|| CompileError::IncompleteOutput {
                contract: contract_name.clone(),
                what: "linked bytecode",
            })?;

        info!("{} compiled successfully.", source_name);
        Ok(ContractArtifact {
            source_name,
            contract_name,
            bytecode,
            abi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractFile;
    use ethers_solc::EvmVersion;

    fn greeter() -> ContractSource {
        ContractSource {
            file: ContractFile::new(PathBuf::from("contracts/Greeter.sol")).unwrap(),
            text: "pragma solidity ^0.8.0; contract Greeter {}".to_string(),
        }
    }

    #[test]
    fn test_input_enables_optimizer_with_pinned_runs() {
        let compiler = SolcCompiler::new(DEFAULT_SOLC_VERSION);
        let input = compiler
            .compiler_input(&greeter(), &Version::new(0, 8, 0))
            .unwrap();

        assert_eq!(input.settings.optimizer.enabled, Some(true));
        assert_eq!(input.settings.optimizer.runs, Some(200));
    }

    #[test]
    fn test_input_targets_an_evm_the_compiler_knows() {
        let compiler = SolcCompiler::new(DEFAULT_SOLC_VERSION);

        let input = compiler
            .compiler_input(&greeter(), &Version::new(0, 8, 0))
            .unwrap();
        assert_eq!(input.settings.evm_version, Some(EvmVersion::Istanbul));

        let input = compiler
            .compiler_input(&greeter(), &Version::new(0, 8, 20))
            .unwrap();
        assert_eq!(input.settings.evm_version, Some(EvmVersion::Shanghai));
    }

    #[test]
    fn test_input_keys_source_by_file_name() {
        let compiler = SolcCompiler::new(DEFAULT_SOLC_VERSION).with_optimizer_runs(1_000);
        let input = compiler
            .compiler_input(&greeter(), &Version::new(0, 8, 0))
            .unwrap();

        let keys: Vec<&PathBuf> = input.sources.keys().collect();
        assert_eq!(keys, vec![&PathBuf::from("Greeter.sol")]);
        assert_eq!(
            input.sources[&PathBuf::from("Greeter.sol")].content.as_str(),
            "pragma solidity ^0.8.0; contract Greeter {}"
        );
        assert_eq!(input.settings.optimizer.runs, Some(1_000));
    }
}
