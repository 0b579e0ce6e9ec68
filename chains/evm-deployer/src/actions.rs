//! Follow-up calls against a freshly deployed token contract.
//!
//! Each round is isolated: a failed transfer or mint is logged and the next
//! round still runs. Only a fault that makes further rounds meaningless
//! (missing ABI function, unreadable `decimals()`) ends the run early, and
//! even then nothing propagates to the caller.

use crate::client::ChainClient;
use crate::contracts::ContractKind;
use crate::executor::{TransactionExecutor, TransactionOutcome};
use crate::pipeline::DeployedInstance;
use crate::utils::{scale_by_decimals, AddressGenerator};
use anyhow::{anyhow, Context, Result};
use core_logic::Clock;
use ethers::abi::{Abi, Function, Token};
use ethers::prelude::*;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// keccak256("Transfer(address,address,uint256)")
pub fn transfer_event_topic() -> H256 {
    H256::from(ethers::utils::keccak256("Transfer(address,address,uint256)".as_bytes()))
}

/// Id of the token minted to `owner` by `contract`, read from the ERC-721
/// `Transfer(0x0, owner, id)` event. `None` means the id is unavailable.
pub fn minted_token_id(logs: &[Log], contract: Address, owner: Address) -> Option<U256> {
    let topic = transfer_event_topic();
    let zero = H256::zero();
    let owner_topic = H256::from(owner);

    logs.iter()
        .filter(|log| log.address == contract)
        .find(|log| {
            log.topics.len() == 4
                && log.topics[0] == topic
                && log.topics[1] == zero
                && log.topics[2] == owner_topic
        })
        .map(|log| U256::from_big_endian(log.topics[3].as_bytes()))
}

fn function_with_arity<'a>(abi: &'a Abi, name: &str, inputs: usize) -> Result<&'a Function> {
    abi.functions_by_name(name)
        .with_context(|| format!("ABI has no '{}' function", name))?
        .iter()
        .find(|f| f.inputs.len() == inputs)
        .ok_or_else(|| anyhow!("ABI has no '{}' taking {} arguments", name, inputs))
}

fn encode_call(abi: &Abi, name: &str, args: &[Token]) -> Result<Bytes> {
    let function = function_with_arity(abi, name, args.len())?;
    let data = function
        .encode_input(args)
        .with_context(|| format!("Failed to encode {}", name))?;
    Ok(Bytes::from(data))
}

#[derive(Debug, Clone)]
pub struct ActionSettings {
    pub rounds: usize,
    pub pause_min: Duration,
    pub pause_max: Duration,
    /// Whole tokens per transfer, inclusive.
    pub token_amount_min: u64,
    pub token_amount_max: u64,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            rounds: 3,
            pause_min: Duration::from_secs(5),
            pause_max: Duration::from_secs(15),
            token_amount_min: 1,
            token_amount_max: 10,
        }
    }
}

impl ActionSettings {
    fn pause<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.pause_min.as_millis() as u64;
        let max = (self.pause_max.as_millis() as u64).max(min);
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

/// What the runner did for one deployed instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Transfers stopped because the token balance ran out.
    pub stopped_early: bool,
    /// Mints that succeeded but whose token id could not be derived.
    pub unidentified_mints: usize,
    pub aborted: Option<String>,
}

impl ActionReport {
    fn record(&mut self, outcome: &TransactionOutcome) {
        self.attempted += 1;
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl fmt::Display for ActionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} calls ({} ok, {} failed)",
            self.attempted, self.succeeded, self.failed
        )?;
        if self.stopped_early {
            write!(f, ", stopped on low balance")?;
        }
        if self.unidentified_mints > 0 {
            write!(f, ", {} mint ids unavailable", self.unidentified_mints)?;
        }
        if let Some(reason) = &self.aborted {
            write!(f, ", aborted: {}", reason)?;
        }
        Ok(())
    }
}

pub struct PostDeploymentActionRunner<C, T> {
    executor: TransactionExecutor<C>,
    clock: Arc<T>,
    settings: ActionSettings,
    addresses: AddressGenerator,
}

impl<C: ChainClient, T: Clock> PostDeploymentActionRunner<C, T> {
    pub fn new(executor: TransactionExecutor<C>, clock: Arc<T>, settings: ActionSettings) -> Self {
        Self {
            executor,
            clock,
            settings,
            addresses: AddressGenerator,
        }
    }

    pub async fn run<R: Rng + Send + ?Sized>(
        &self,
        instance: &DeployedInstance,
        rng: &mut R,
    ) -> ActionReport {
        let mut report = ActionReport::default();
        let result = match instance.kind {
            ContractKind::FungibleToken => {
                info!(
                    "Performing {} ERC20 transfers...",
                    self.settings.rounds
                );
                self.run_token_transfers(instance, rng, &mut report).await
            }
            ContractKind::NonFungibleToken => {
                info!(
                    "Minting and transferring {} ERC721 NFTs...",
                    self.settings.rounds
                );
                self.run_nft_mints(instance, rng, &mut report).await
            }
            _ => return report,
        };

        if let Err(e) = result {
            warn!("Post-deployment actions aborted: {:#}", e);
            report.aborted = Some(format!("{:#}", e));
        }
        report
    }

    async fn read_uint(&self, contract: Address, abi: &Abi, name: &str, args: &[Token]) -> Result<U256> {
        let function = function_with_arity(abi, name, args.len())?;
        let calldata = encode_call(abi, name, args)?;
        let raw = self.executor.read(contract, calldata).await?;
        let decoded = function
            .decode_output(&raw)
            .with_context(|| format!("Failed to decode {} output", name))?;
        decoded
            .into_iter()
            .next()
            .and_then(Token::into_uint)
            .ok_or_else(|| anyhow!("{} did not return a uint", name))
    }

    async fn read_symbol(&self, instance: &DeployedInstance) -> Result<String> {
        let function = function_with_arity(&instance.abi, "symbol", 0)?;
        let calldata = encode_call(&instance.abi, "symbol", &[])?;
        let raw = self.executor.read(instance.address, calldata).await?;
        function
            .decode_output(&raw)?
            .into_iter()
            .next()
            .and_then(Token::into_string)
            .ok_or_else(|| anyhow!("symbol did not return a string"))
    }

    async fn run_token_transfers<R: Rng + Send + ?Sized>(
        &self,
        instance: &DeployedInstance,
        rng: &mut R,
        report: &mut ActionReport,
    ) -> Result<()> {
        let me = self.executor.address();
        let decimals = self
            .read_uint(instance.address, &instance.abi, "decimals", &[])
            .await
            .context("Could not read token decimals")?;
        if decimals > U256::from(u8::MAX) {
            return Err(anyhow!("Token reports absurd decimals {}", decimals));
        }
        let decimals = decimals.low_u64() as u8;
        let symbol = self
            .read_symbol(instance)
            .await
            .unwrap_or_else(|_| "tokens".to_string());

        for round in 0..self.settings.rounds {
            let recipient = self.addresses.generate(rng);
            let whole = rng.gen_range(self.settings.token_amount_min..=self.settings.token_amount_max);
            let amount = scale_by_decimals(whole, decimals)
                .ok_or_else(|| anyhow!("Transfer amount overflows for {} decimals", decimals))?;

            let balance = match self
                .read_uint(instance.address, &instance.abi, "balanceOf", &[Token::Address(me)])
                .await
            {
                Ok(balance) => balance,
                Err(e) => {
                    warn!("  Round {}: could not read token balance: {:#}", round + 1, e);
                    report.attempted += 1;
                    report.failed += 1;
                    self.clock.sleep(self.settings.pause(rng)).await;
                    continue;
                }
            };

            if balance < amount {
                info!(
                    "  Insufficient ERC20 token balance ({}) to transfer {}. Skipping transfers.",
                    balance, amount
                );
                report.stopped_early = true;
                break;
            }

            info!("  Transferring {} {} to {:?}...", whole, symbol, recipient);
            let calldata = encode_call(
                &instance.abi,
                "transfer",
                &[Token::Address(recipient), Token::Uint(amount)],
            )?;
            let outcome = self
                .executor
                .execute(Some(instance.address), calldata, U256::zero())
                .await;
            report_step("transfer", &outcome);
            report.record(&outcome);

            self.clock.sleep(self.settings.pause(rng)).await;
        }
        Ok(())
    }

    async fn run_nft_mints<R: Rng + Send + ?Sized>(
        &self,
        instance: &DeployedInstance,
        rng: &mut R,
        report: &mut ActionReport,
    ) -> Result<()> {
        let me = self.executor.address();
        let mut minted = Vec::new();

        for round in 0..self.settings.rounds {
            info!("  Minting NFT {} to {:?}...", round + 1, me);
            let calldata = encode_call(&instance.abi, "mint", &[Token::Address(me)])?;
            let outcome = self
                .executor
                .execute(Some(instance.address), calldata, U256::zero())
                .await;
            report_step("mint", &outcome);
            report.record(&outcome);

            if outcome.success {
                match minted_token_id(&outcome.logs, instance.address, me) {
                    Some(id) => {
                        info!("  Minted token id {}", id);
                        minted.push(id);
                    }
                    None => {
                        warn!("  Token id unavailable: no Transfer event in mint receipt. Skipping transfer for this NFT.");
                        report.unidentified_mints += 1;
                    }
                }
            }

            self.clock.sleep(self.settings.pause(rng)).await;
        }

        for id in minted {
            let recipient = self.addresses.generate(rng);
            info!(
                "  Transferring NFT ID {} from {:?} to {:?}...",
                id, me, recipient
            );
            let calldata = encode_call(
                &instance.abi,
                "safeTransferFrom",
                &[Token::Address(me), Token::Address(recipient), Token::Uint(id)],
            )?;
            let outcome = self
                .executor
                .execute(Some(instance.address), calldata, U256::zero())
                .await;
            report_step("safeTransferFrom", &outcome);
            report.record(&outcome);

            self.clock.sleep(self.settings.pause(rng)).await;
        }
        Ok(())
    }
}

fn report_step(name: &str, outcome: &TransactionOutcome) {
    if outcome.success {
        info!("  {} transaction SUCCESS", name);
    } else if outcome.is_ambiguous() {
        warn!("  {} transaction outcome unknown (not confirmed in time)", name);
    } else {
        warn!("  {} transaction FAILED", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_log(contract: Address, from: Address, to: Address, id: u64) -> Log {
        Log {
            address: contract,
            topics: vec![
                transfer_event_topic(),
                H256::from(from),
                H256::from(to),
                H256::from_low_u64_be(id),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_minted_id_from_transfer_event() {
        let contract = Address::repeat_byte(0xaa);
        let me = Address::repeat_byte(0x01);
        let logs = vec![transfer_log(contract, Address::zero(), me, 7)];
        assert_eq!(minted_token_id(&logs, contract, me), Some(U256::from(7)));
    }

    #[test]
    fn test_minted_id_ignores_other_transfers() {
        let contract = Address::repeat_byte(0xaa);
        let me = Address::repeat_byte(0x01);
        let other = Address::repeat_byte(0x02);
        let logs = vec![
            // plain transfer, not a mint
            transfer_log(contract, other, me, 1),
            // mint from a different contract
            transfer_log(Address::repeat_byte(0xbb), Address::zero(), me, 2),
            // mint to someone else
            transfer_log(contract, Address::zero(), other, 3),
        ];
        assert_eq!(minted_token_id(&logs, contract, me), None);
        assert_eq!(minted_token_id(&[], contract, me), None);
    }

    #[test]
    fn test_erc20_transfer_log_is_not_a_mint() {
        // ERC-20 Transfer has the amount in data, so only 3 topics
        let contract = Address::repeat_byte(0xaa);
        let me = Address::repeat_byte(0x01);
        let mut log = transfer_log(contract, Address::zero(), me, 5);
        log.topics.truncate(3);
        assert_eq!(minted_token_id(&[log], contract, me), None);
    }

    #[test]
    fn test_pause_within_bounds() {
        use rand::SeedableRng;
        let settings = ActionSettings::default();
        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let pause = settings.pause(&mut rng);
            assert!(pause >= Duration::from_secs(5) && pause <= Duration::from_secs(15));
        }
    }
}
