//! Transaction intents and the protocol messages they compose into.

use cosmos_sdk_proto::cosmos::bank::v1beta1::MsgSend;
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use cosmos_sdk_proto::cosmos::distribution::v1beta1::{
    MsgWithdrawDelegatorReward, MsgWithdrawValidatorCommission,
};
use cosmos_sdk_proto::cosmos::gov::v1beta1::{MsgVote, VoteOption};
use cosmos_sdk_proto::cosmos::staking::v1beta1::{MsgBeginRedelegate, MsgDelegate, MsgUndelegate};
use cosmos_sdk_proto::Any;
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ValidationError;
use crate::fee::{MULTI_VALIDATOR_GAS, PAIRED_WITHDRAW_GAS, SINGLE_MESSAGE_GAS};
use crate::units::{is_positive_base_amount, normalize_base_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
    NoWithVeto,
}

impl From<VoteChoice> for VoteOption {
    fn from(choice: VoteChoice) -> Self {
        match choice {
            VoteChoice::Yes => VoteOption::Yes,
            VoteChoice::No => VoteOption::No,
            VoteChoice::Abstain => VoteOption::Abstain,
            VoteChoice::NoWithVeto => VoteOption::NoWithVeto,
        }
    }
}

impl std::str::FromStr for VoteChoice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "abstain" => Ok(Self::Abstain),
            "nowithveto" | "veto" => Ok(Self::NoWithVeto),
            _ => Err(ValidationError::new("option", format!("unknown vote option {s}"))),
        }
    }
}

/// A user action, as submitted by the UI. Amounts are base-unit integer strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionIntent {
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
        src_validator: String,
        dst_validator: String,
        amount: String,
    },
    WithdrawRewards {
        delegator: String,
        validator: String,
    },
    WithdrawCommission {
        validator: String,
    },
    WithdrawAllForValidator {
        delegator: String,
        validator: String,
        has_rewards: bool,
        has_commission: bool,
    },
    WithdrawAllAcrossValidators {
        delegator: String,
        validators: Vec<String>,
    },
    Send {
        from: String,
        to: String,
        amount: String,
    },
    Vote {
        voter: String,
        proposal_id: u64,
        option: VoteChoice,
    },
}

impl TransactionIntent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delegate { .. } => "delegate",
            Self::Undelegate { .. } => "undelegate",
            Self::Redelegate { .. } => "redelegate",
            Self::WithdrawRewards { .. } => "withdraw_rewards",
            Self::WithdrawCommission { .. } => "withdraw_commission",
            Self::WithdrawAllForValidator { .. } => "withdraw_all_for_validator",
            Self::WithdrawAllAcrossValidators { .. } => "withdraw_all_across_validators",
            Self::Send { .. } => "send",
            Self::Vote { .. } => "vote",
        }
    }

    pub fn suggested_gas_limit(&self) -> u64 {
        match self {
            Self::WithdrawAllAcrossValidators { .. } => MULTI_VALIDATOR_GAS,
            Self::WithdrawAllForValidator {
                has_rewards: true,
                has_commission: true,
                ..
            } => PAIRED_WITHDRAW_GAS,
            _ => SINGLE_MESSAGE_GAS,
        }
    }
}

/// One protocol message, still typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Delegate(MsgDelegate),
    Undelegate(MsgUndelegate),
    Redelegate(MsgBeginRedelegate),
    WithdrawRewards(MsgWithdrawDelegatorReward),
    WithdrawCommission(MsgWithdrawValidatorCommission),
    Send(MsgSend),
    Vote(MsgVote),
}

impl Msg {
    pub fn type_url(&self) -> &'static str {
        match self {
            Self::Delegate(_) => "/cosmos.staking.v1beta1.MsgDelegate",
            Self::Undelegate(_) => "/cosmos.staking.v1beta1.MsgUndelegate",
            Self::Redelegate(_) => "/cosmos.staking.v1beta1.MsgBeginRedelegate",
            Self::WithdrawRewards(_) => "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward",
            Self::WithdrawCommission(_) => {
                "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission"
            }
            Self::Send(_) => "/cosmos.bank.v1beta1.MsgSend",
            Self::Vote(_) => "/cosmos.gov.v1beta1.MsgVote",
        }
    }

    pub fn to_any(&self) -> Any {
        let value = match self {
            Self::Delegate(m) => m.encode_to_vec(),
            Self::Undelegate(m) => m.encode_to_vec(),
            Self::Redelegate(m) => m.encode_to_vec(),
            Self::WithdrawRewards(m) => m.encode_to_vec(),
            Self::WithdrawCommission(m) => m.encode_to_vec(),
            Self::Send(m) => m.encode_to_vec(),
            Self::Vote(m) => m.encode_to_vec(),
        };
        Any {
            type_url: self.type_url().into(),
            value,
        }
    }

    /// Proto3 JSON rendering, used for dry runs.
    pub fn to_json(&self) -> Value {
        let coin = |c: &Option<Coin>| c.as_ref().map(coin_json).unwrap_or(Value::Null);
        let body = match self {
            Self::Delegate(m) => json!({
                "delegator_address": m.delegator_address,
                "validator_address": m.validator_address,
                "amount": coin(&m.amount),
            }),
            Self::Undelegate(m) => json!({
                "delegator_address": m.delegator_address,
                "validator_address": m.validator_address,
                "amount": coin(&m.amount),
            }),
            Self::Redelegate(m) => json!({
                "delegator_address": m.delegator_address,
                "validator_src_address": m.validator_src_address,
                "validator_dst_address": m.validator_dst_address,
                "amount": coin(&m.amount),
            }),
            Self::WithdrawRewards(m) => json!({
                "delegator_address": m.delegator_address,
                "validator_address": m.validator_address,
            }),
            Self::WithdrawCommission(m) => json!({
                "validator_address": m.validator_address,
            }),
            Self::Send(m) => json!({
                "from_address": m.from_address,
                "to_address": m.to_address,
                "amount": m.amount.iter().map(coin_json).collect::<Vec<_>>(),
            }),
            Self::Vote(m) => json!({
                "proposal_id": m.proposal_id.to_string(),
                "voter": m.voter,
                "option": VoteOption::try_from(m.option)
                    .map(|o| o.as_str_name())
                    .unwrap_or("VOTE_OPTION_UNSPECIFIED"),
            }),
        };
        let mut msg = json!({ "@type": self.type_url() });
        if let (Value::Object(target), Value::Object(fields)) = (&mut msg, body) {
            target.extend(fields);
        }
        msg
    }
}

fn coin_json(coin: &Coin) -> Value {
    json!({ "denom": coin.denom, "amount": coin.amount })
}

/// Checks the rules every intent must satisfy before anything is composed.
pub fn validate(intent: &TransactionIntent) -> Result<(), ValidationError> {
    match intent {
        TransactionIntent::Delegate {
            delegator,
            validator,
            amount,
        }
        | TransactionIntent::Undelegate {
            delegator,
            validator,
            amount,
        } => {
            require_address("delegator", delegator)?;
            require_address("validator", validator)?;
            require_positive(amount)?;
        }
        TransactionIntent::Redelegate {
            delegator,
            src_validator,
            dst_validator,
            amount,
        } => {
            require_address("delegator", delegator)?;
            require_address("src_validator", src_validator)?;
            require_address("dst_validator", dst_validator)?;
            require_positive(amount)?;
            if src_validator == dst_validator {
                return Err(ValidationError::new(
                    "dst_validator",
                    "must differ from the source validator",
                ));
            }
        }
        TransactionIntent::WithdrawRewards {
            delegator,
            validator,
        } => {
            require_address("delegator", delegator)?;
            require_address("validator", validator)?;
        }
        TransactionIntent::WithdrawCommission { validator } => {
            require_address("validator", validator)?;
        }
        TransactionIntent::WithdrawAllForValidator {
            delegator,
            validator,
            has_rewards,
            has_commission,
        } => {
            require_address("delegator", delegator)?;
            require_address("validator", validator)?;
            if !has_rewards && !has_commission {
                return Err(ValidationError::new(
                    "has_rewards",
                    "nothing to withdraw: neither rewards nor commission",
                ));
            }
        }
        TransactionIntent::WithdrawAllAcrossValidators {
            delegator,
            validators,
        } => {
            require_address("delegator", delegator)?;
            if validators.is_empty() {
                return Err(ValidationError::new("validators", "must not be empty"));
            }
            for validator in validators {
                require_address("validators", validator)?;
            }
        }
        TransactionIntent::Send { from, to, amount } => {
            require_address("from", from)?;
            require_address("to", to)?;
            require_positive(amount)?;
        }
        TransactionIntent::Vote {
            voter, proposal_id, ..
        } => {
            require_address("voter", voter)?;
            if *proposal_id == 0 {
                return Err(ValidationError::new("proposal_id", "must be positive"));
            }
        }
    }
    Ok(())
}

/// Validates `intent` and builds its messages. Pure: no network, no signer.
///
/// Multi-message intents come back as one list, meant for a single
/// transaction so the chain applies them atomically.
pub fn compose(intent: &TransactionIntent, denom: &str) -> Result<Vec<Msg>, ValidationError> {
    validate(intent)?;

    let coin = |amount: &str| -> Result<Coin, ValidationError> {
        Ok(Coin {
            denom: denom.into(),
            amount: normalize_base_amount(amount)
                .map_err(|err| ValidationError::new("amount", err.to_string()))?,
        })
    };

    Ok(match intent {
        TransactionIntent::Delegate {
            delegator,
            validator,
            amount,
        } => vec![Msg::Delegate(MsgDelegate {
            delegator_address: delegator.clone(),
            validator_address: validator.clone(),
            amount: Some(coin(amount)?),
        })],
        TransactionIntent::Undelegate {
            delegator,
            validator,
            amount,
        } => vec![Msg::Undelegate(MsgUndelegate {
            delegator_address: delegator.clone(),
            validator_address: validator.clone(),
            amount: Some(coin(amount)?),
        })],
        TransactionIntent::Redelegate {
            delegator,
            src_validator,
            dst_validator,
            amount,
        } => vec![Msg::Redelegate(MsgBeginRedelegate {
            delegator_address: delegator.clone(),
            validator_src_address: src_validator.clone(),
            validator_dst_address: dst_validator.clone(),
            amount: Some(coin(amount)?),
        })],
        TransactionIntent::WithdrawRewards {
            delegator,
            validator,
        } => vec![withdraw_reward(delegator, validator)],
        TransactionIntent::WithdrawCommission { validator } => {
            vec![withdraw_commission(validator)]
        }
        TransactionIntent::WithdrawAllForValidator {
            delegator,
            validator,
            has_rewards,
            has_commission,
        } => {
            let mut msgs = vec![];
            if *has_rewards {
                msgs.push(withdraw_reward(delegator, validator));
            }
            if *has_commission {
                msgs.push(withdraw_commission(validator));
            }
            msgs
        }
        TransactionIntent::WithdrawAllAcrossValidators {
            delegator,
            validators,
        } => validators
            .iter()
            .map(|validator| withdraw_reward(delegator, validator))
            .collect(),
        TransactionIntent::Send { from, to, amount } => vec![Msg::Send(MsgSend {
            from_address: from.clone(),
            to_address: to.clone(),
            amount: vec![coin(amount)?],
        })],
        TransactionIntent::Vote {
            voter,
            proposal_id,
            option,
        } => vec![Msg::Vote(MsgVote {
            proposal_id: *proposal_id,
            voter: voter.clone(),
            option: VoteOption::from(*option).into(),
        })],
    })
}

/// Checks that account addresses carry `prefix` and validator operator
/// addresses carry `prefix` + `valoper`.
pub fn validate_addresses(intent: &TransactionIntent, prefix: &str) -> Result<(), ValidationError> {
    let valoper = format!("{prefix}valoper");
    let account = |field, address: &str| check_bech32(field, address, prefix);
    let operator = |field, address: &str| check_bech32(field, address, &valoper);

    match intent {
        TransactionIntent::Delegate {
            delegator,
            validator,
            ..
        }
        | TransactionIntent::Undelegate {
            delegator,
            validator,
            ..
        }
        | TransactionIntent::WithdrawRewards {
            delegator,
            validator,
        }
        | TransactionIntent::WithdrawAllForValidator {
            delegator,
            validator,
            ..
        } => {
            account("delegator", delegator)?;
            operator("validator", validator)
        }
        TransactionIntent::Redelegate {
            delegator,
            src_validator,
            dst_validator,
            ..
        } => {
            account("delegator", delegator)?;
            operator("src_validator", src_validator)?;
            operator("dst_validator", dst_validator)
        }
        TransactionIntent::WithdrawCommission { validator } => operator("validator", validator),
        TransactionIntent::WithdrawAllAcrossValidators {
            delegator,
            validators,
        } => {
            account("delegator", delegator)?;
            validators
                .iter()
                .try_for_each(|validator| operator("validators", validator))
        }
        TransactionIntent::Send { from, to, .. } => {
            account("from", from)?;
            account("to", to)
        }
        TransactionIntent::Vote { voter, .. } => account("voter", voter),
    }
}

fn check_bech32(field: &'static str, address: &str, expected: &str) -> Result<(), ValidationError> {
    let prefix = crate::utils::bech32_prefix(address)
        .map_err(|err| ValidationError::new(field, format!("not a bech32 address: {err}")))?;
    if prefix != expected {
        return Err(ValidationError::new(
            field,
            format!("expected prefix {expected}, found {prefix}"),
        ));
    }
    Ok(())
}

fn require_address(field: &'static str, address: &str) -> Result<(), ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

fn require_positive(amount: &str) -> Result<(), ValidationError> {
    if !is_positive_base_amount(amount) {
        return Err(ValidationError::new(
            "amount",
            format!("must be a positive integer in base units, got {amount:?}"),
        ));
    }
    Ok(())
}

fn withdraw_reward(delegator: &str, validator: &str) -> Msg {
    Msg::WithdrawRewards(MsgWithdrawDelegatorReward {
        delegator_address: delegator.into(),
        validator_address: validator.into(),
    })
}

fn withdraw_commission(validator: &str) -> Msg {
    Msg::WithdrawCommission(MsgWithdrawValidatorCommission {
        validator_address: validator.into(),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use bech32::{Bech32, Hrp};

    pub fn address(prefix: &str, seed: u8) -> String {
        bech32::encode::<Bech32>(Hrp::parse(prefix).unwrap(), &[seed; 20]).unwrap()
    }

    pub fn delegator() -> String {
        address("cosmos", 1)
    }

    pub fn validator(seed: u8) -> String {
        address("cosmosvaloper", seed)
    }
}
