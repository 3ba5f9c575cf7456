//! Partial JSON shapes of the RPC and LCD responses the core reads.
//! Only fields the dashboard uses are declared; everything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::parse_dec_amount;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub denom: String,
    pub amount: String,
}

/// RPC `/status` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_info: NodeInfo,
    #[serde(default)]
    pub sync_info: SyncInfo,
}

impl NodeStatus {
    pub fn tx_index_enabled(&self) -> bool {
        self.node_info.other.tx_index.eq_ignore_ascii_case("on")
    }

    pub fn latest_height(&self) -> Option<u64> {
        self.sync_info.latest_block_height.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub network: String,
    #[serde(default)]
    pub moniker: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub other: NodeInfoOther,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfoOther {
    #[serde(default)]
    pub tx_index: String,
    #[serde(default)]
    pub rpc_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncInfo {
    #[serde(default)]
    pub latest_block_height: String,
    #[serde(default)]
    pub latest_block_time: String,
    #[serde(default)]
    pub catching_up: bool,
}

/// LCD `/cosmos/base/tendermint/v1beta1/node_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcdNodeInfo {
    pub default_node_info: NodeInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorsResponse {
    pub validators: Vec<Validator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub operator_address: String,
    #[serde(default)]
    pub jailed: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tokens: String,
    #[serde(default)]
    pub delegator_shares: String,
    #[serde(default)]
    pub description: ValidatorDescription,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDescription {
    #[serde(default)]
    pub moniker: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationsResponse {
    #[serde(default)]
    pub delegation_responses: Vec<DelegationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEntry {
    pub delegation: Delegation,
    pub balance: Token,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator_address: String,
    pub validator_address: String,
    #[serde(default)]
    pub shares: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsResponse {
    #[serde(default)]
    pub rewards: Vec<ValidatorReward>,
    #[serde(default)]
    pub total: Vec<Token>,
}

impl RewardsResponse {
    /// Validators owing the delegator at least one whole base unit.
    /// Sub-unit dust is skipped, withdrawing it would pay out nothing.
    pub fn validators_with_rewards(&self) -> Vec<String> {
        self.rewards
            .iter()
            .filter(|r| {
                r.reward
                    .iter()
                    .any(|token| parse_dec_amount(&token.amount).is_ok_and(|amount| amount > 0))
            })
            .map(|r| r.validator_address.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorReward {
    pub validator_address: String,
    #[serde(default)]
    pub reward: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionResponse {
    pub commission: ValidatorCommission,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCommission {
    #[serde(default)]
    pub commission: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesResponse {
    #[serde(default)]
    pub balances: Vec<Token>,
}

/// Proposal shapes differ between gov module versions, so they stay untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalsResponse {
    #[serde(default)]
    pub proposals: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_status_reads_tx_index() {
        let status: NodeStatus = serde_json::from_value(json!({
            "node_info": {
                "network": "cosmoshub-4",
                "moniker": "node",
                "other": {"tx_index": "on", "rpc_address": "tcp://0.0.0.0:26657"}
            },
            "sync_info": {"latest_block_height": "19000000", "catching_up": false},
            "validator_info": {}
        }))
        .unwrap();
        assert!(status.tx_index_enabled());
        assert_eq!(status.latest_height(), Some(19_000_000));
    }

    #[test]
    fn rewards_lists_owing_validators() {
        let rewards: RewardsResponse = serde_json::from_value(json!({
            "rewards": [
                {"validator_address": "v1", "reward": [{"denom": "uatom", "amount": "12.5"}]},
                {"validator_address": "v2", "reward": []},
                {"validator_address": "v3", "reward": [{"denom": "uatom", "amount": "0.300000000000000000"}]}
            ],
            "total": [{"denom": "uatom", "amount": "12.5"}]
        }))
        .unwrap();
        assert_eq!(rewards.validators_with_rewards(), vec!["v1".to_string()]);
    }
}
