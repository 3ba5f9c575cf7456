use std::str::FromStr;

use anyhow::Context;

use crate::fee::{GasPrice, GasTier};
use crate::msg::VoteChoice;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotePair {
    pub proposal_id: u64,
    pub option: VoteChoice,
}

impl FromStr for VotePair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (left, right) = s.split_once(':').context("expected <proposal>:<option>")?;
        Ok(VotePair {
            proposal_id: left.parse()?,
            option: right.parse()?,
        })
    }
}

/// `--price` beats `--tier`; neither means the chain's average tier.
pub fn custom_gas_price(
    tier: Option<GasTier>,
    price: Option<rust_decimal::Decimal>,
) -> Option<GasPrice> {
    price
        .map(GasPrice::Exact)
        .or_else(|| tier.map(GasPrice::Tier))
}
