use ethers::prelude::*;

/// What a transaction can cost at most: full gas limit at the given price.
pub fn worst_case_cost(gas_limit: u64, gas_price: U256) -> U256 {
    U256::from(gas_limit).saturating_mul(gas_price)
}

/// Ether amount for log lines only; never fed back into a transaction.
pub fn display_ether(wei: U256) -> String {
    ethers::utils::format_ether(wei)
}

/// `whole * 10^decimals` without overflow panics.
pub fn scale_by_decimals(whole: u64, decimals: u8) -> Option<U256> {
    U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .and_then(|unit| unit.checked_mul(U256::from(whole)))
}
