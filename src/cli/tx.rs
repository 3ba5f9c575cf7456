use clap::Subcommand;

use crate::chain::ChainProfile;
use crate::msg::TransactionIntent;
use crate::units::to_base;
use crate::Result;

use super::utils::VotePair;

/// Amounts are given in display units (`1.5` for 1.5 ATOM).
#[derive(Subcommand, Debug)]
pub enum Transaction {
    Send {
        from: String,
        to: String,
        amount: String,
    },
    Delegate {
        delegator: String,
        validator: String,
        amount: String,
    },
    Undelegate {
        delegator: String,
        validator: String,
        amount: String,
    },
    Redelegate {
        delegator: String,
        source: String,
        target: String,
        amount: String,
    },
    WithdrawRewards {
        delegator: String,
        validator: String,
    },
    WithdrawCommission {
        validator: String,
    },
    WithdrawAll {
        delegator: String,
        validator: String,
        #[arg(long)]
        rewards: bool,
        #[arg(long)]
        commission: bool,
    },
    /// Without validators, every validator currently owing rewards is used.
    WithdrawAllValidators {
        delegator: String,
        validators: Vec<String>,
    },
    Vote {
        voter: String,
        vote: VotePair,
    },
}

impl Transaction {
    pub fn to_intent(&self, profile: &ChainProfile) -> Result<TransactionIntent> {
        let base = |amount: &str| to_base(amount, profile.exponent);

        Ok(match self {
            Self::Send { from, to, amount } => TransactionIntent::Send {
                from: from.clone(),
                to: to.clone(),
                amount: base(amount)?,
            },
            Self::Delegate {
                delegator,
                validator,
                amount,
            } => TransactionIntent::Delegate {
                delegator: delegator.clone(),
                validator: validator.clone(),
                amount: base(amount)?,
            },
            Self::Undelegate {
                delegator,
                validator,
                amount,
            } => TransactionIntent::Undelegate {
                delegator: delegator.clone(),
                validator: validator.clone(),
                amount: base(amount)?,
            },
            Self::Redelegate {
                delegator,
                source,
                target,
                amount,
            } => TransactionIntent::Redelegate {
                delegator: delegator.clone(),
                src_validator: source.clone(),
                dst_validator: target.clone(),
                amount: base(amount)?,
            },
            Self::WithdrawRewards {
                delegator,
                validator,
            } => TransactionIntent::WithdrawRewards {
                delegator: delegator.clone(),
                validator: validator.clone(),
            },
            Self::WithdrawCommission { validator } => TransactionIntent::WithdrawCommission {
                validator: validator.clone(),
            },
            Self::WithdrawAll {
                delegator,
                validator,
                rewards,
                commission,
            } => TransactionIntent::WithdrawAllForValidator {
                delegator: delegator.clone(),
                validator: validator.clone(),
                has_rewards: *rewards,
                has_commission: *commission,
            },
            Self::WithdrawAllValidators {
                delegator,
                validators,
            } => TransactionIntent::WithdrawAllAcrossValidators {
                delegator: delegator.clone(),
                validators: validators.clone(),
            },
            Self::Vote { voter, vote } => TransactionIntent::Vote {
                voter: voter.clone(),
                proposal_id: vote.proposal_id,
                option: vote.option,
            },
        })
    }
}
