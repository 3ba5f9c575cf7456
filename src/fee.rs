use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use cosmos_sdk_proto::cosmos::tx::v1beta1::Fee;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::GasPriceTiers;
use crate::error::ValidationError;

/// Suggested gas limits. The fee calculator never picks one on its own;
/// callers pass a limit explicitly.
pub const SINGLE_MESSAGE_GAS: u64 = 250_000;
pub const PAIRED_WITHDRAW_GAS: u64 = 300_000;
pub const MULTI_VALIDATOR_GAS: u64 = 500_000;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum GasTier {
    Low,
    #[default]
    Average,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPrice {
    Tier(GasTier),
    Exact(Decimal),
}

impl Default for GasPrice {
    fn default() -> Self {
        Self::Tier(GasTier::Average)
    }
}

/// Price per gas unit: the override when given, the chain's average tier otherwise.
pub fn gas_price(tiers: &GasPriceTiers, price: Option<GasPrice>) -> Decimal {
    match price.unwrap_or_default() {
        GasPrice::Tier(tier) => tiers.price(tier),
        GasPrice::Exact(price) => price,
    }
}

/// `ceil(gas_limit * gas_price)` in `denom`.
pub fn compute_fee(gas_limit: u64, gas_price: Decimal, denom: &str) -> Result<Coin, ValidationError> {
    if gas_price.is_sign_negative() {
        return Err(ValidationError::new("gas_price", "must not be negative"));
    }
    let amount = Decimal::from(gas_limit)
        .checked_mul(gas_price)
        .ok_or_else(|| ValidationError::new("gas_price", "fee overflows"))?
        .ceil()
        .to_u128()
        .ok_or_else(|| ValidationError::new("gas_price", "fee is not representable"))?;

    Ok(Coin {
        denom: denom.into(),
        amount: amount.to_string(),
    })
}

pub fn to_fee(amount: Coin, gas_limit: u64) -> Fee {
    let fees = if amount.amount != "0" {
        vec![amount]
    } else {
        vec![]
    };

    Fee {
        amount: fees,
        gas_limit,
        payer: String::new(),
        granter: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn fee_is_rounded_up() {
        assert_eq!(compute_fee(200_000, dec("0.025"), "uatom").unwrap().amount, "5000");
        assert_eq!(compute_fee(250_001, dec("0.025"), "uatom").unwrap().amount, "6251");
        assert_eq!(compute_fee(1, dec("0.0001"), "uatom").unwrap().amount, "1");
    }

    #[test]
    fn price_defaults_to_average_tier() {
        let tiers = crate::chain::fixtures::profile().gas_price_tiers;
        assert_eq!(gas_price(&tiers, None), dec("0.025"));
        assert_eq!(gas_price(&tiers, Some(GasPrice::Tier(GasTier::High))), dec("0.04"));
        assert_eq!(gas_price(&tiers, Some(GasPrice::Exact(dec("0.5")))), dec("0.5"));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = compute_fee(100, dec("-0.1"), "uatom").unwrap_err();
        assert_eq!(err.field, "gas_price");
    }

    #[test]
    fn zero_fee_has_no_coin() {
        let coin = compute_fee(300_000, Decimal::ZERO, "uatom").unwrap();
        let fee = to_fee(coin, 300_000);
        assert!(fee.amount.is_empty());
        assert_eq!(fee.gas_limit, 300_000);
    }
}
