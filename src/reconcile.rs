use std::time::Duration;

use tracing::{info, warn};

use crate::chain::{Endpoint, ProtocolKind};
use crate::error::{ChainMismatchWarning, FailureReason};
use crate::failover::{fetch, RequestSpec};
use crate::transport::Transport;
use crate::types::{LcdNodeInfo, NodeStatus};

pub const LCD_NODE_INFO_PATH: &str = "/cosmos/base/tendermint/v1beta1/node_info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIdentity {
    pub configured: String,
    /// `None` when the node could not be asked.
    pub live: Option<String>,
    /// Id to sign under: the live one whenever it is known.
    pub effective: String,
}

impl ChainIdentity {
    pub fn mismatched(&self) -> bool {
        self.live
            .as_deref()
            .is_some_and(|live| live != self.configured)
    }

    /// When the node could not be asked, signs under `last_live` rather
    /// than the configured id.
    pub fn or_last_live(mut self, last_live: Option<&str>) -> Self {
        if self.live.is_none() {
            if let Some(last_live) = last_live {
                self.effective = last_live.to_owned();
            }
        }
        self
    }
}

/// Chain id the node at `endpoint` reports about itself.
pub async fn live_chain_id(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<String, FailureReason> {
    let network = match endpoint.kind {
        ProtocolKind::Rpc => {
            fetch::<NodeStatus>(transport, endpoint, &RequestSpec::get("/status"), timeout)
                .await?
                .node_info
                .network
        }
        ProtocolKind::Lcd => {
            fetch::<LcdNodeInfo>(
                transport,
                endpoint,
                &RequestSpec::get(LCD_NODE_INFO_PATH),
                timeout,
            )
            .await?
            .default_node_info
            .network
        }
    };

    if network.is_empty() {
        return Err(FailureReason::EmptyPayload);
    }
    Ok(network)
}

/// Aligns the configured chain id with what the node actually runs.
/// Never fails: an unreachable node leaves the configured id in place.
pub async fn reconcile(
    transport: &dyn Transport,
    configured_chain_id: &str,
    endpoint: &Endpoint,
    timeout: Duration,
) -> ChainIdentity {
    match live_chain_id(transport, endpoint, timeout).await {
        Ok(live) => {
            if live != configured_chain_id {
                let warning = ChainMismatchWarning {
                    configured: configured_chain_id.into(),
                    live: live.clone(),
                    endpoint: endpoint.url.clone(),
                };
                warn!(%warning, "signing under live chain id");
            } else {
                info!(chain_id = live.as_str(), "chain id confirmed");
            }
            ChainIdentity {
                configured: configured_chain_id.into(),
                effective: live.clone(),
                live: Some(live),
            }
        }
        Err(reason) => {
            warn!(
                endpoint = endpoint.url.as_str(),
                %reason,
                "could not read live chain id, keeping configured one"
            );
            ChainIdentity {
                configured: configured_chain_id.into(),
                live: None,
                effective: configured_chain_id.into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::ScriptedTransport;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn live_id_wins_on_mismatch() {
        let endpoint = Endpoint::rpc("http://rpc.test", "t");
        let transport = ScriptedTransport::new().ok(
            "http://rpc.test/status",
            json!({"result": {"node_info": {"network": "testhub-2"}}}),
        );

        let identity = reconcile(&transport, "testhub-1", &endpoint, TIMEOUT).await;

        assert_eq!(identity.effective, "testhub-2");
        assert!(identity.mismatched());
    }

    #[tokio::test]
    async fn matching_id_is_kept() {
        let endpoint = Endpoint::rpc("http://rpc.test", "t");
        let transport = ScriptedTransport::new().ok(
            "http://rpc.test/status",
            json!({"result": {"node_info": {"network": "testhub-1"}}}),
        );

        let identity = reconcile(&transport, "testhub-1", &endpoint, TIMEOUT).await;

        assert_eq!(identity.effective, "testhub-1");
        assert!(!identity.mismatched());
    }

    #[tokio::test]
    async fn unreachable_node_keeps_configured_id() {
        let endpoint = Endpoint::rpc("http://rpc.test", "t");
        let transport =
            ScriptedTransport::new().fail("http://rpc.test/status", FailureReason::Timeout);

        let identity = reconcile(&transport, "testhub-1", &endpoint, TIMEOUT).await;

        assert_eq!(identity.live, None);
        assert_eq!(identity.effective, "testhub-1");
        assert!(!identity.mismatched());
    }

    #[tokio::test]
    async fn unreachable_node_falls_back_to_last_live_id() {
        let endpoint = Endpoint::rpc("http://rpc.test", "t");
        let transport =
            ScriptedTransport::new().fail("http://rpc.test/status", FailureReason::Timeout);

        let identity = reconcile(&transport, "testhub-1", &endpoint, TIMEOUT)
            .await
            .or_last_live(Some("testhub-2"));

        assert_eq!(identity.effective, "testhub-2");
    }

    #[tokio::test]
    async fn fresh_live_id_beats_last_live_id() {
        let endpoint = Endpoint::rpc("http://rpc.test", "t");
        let transport = ScriptedTransport::new().ok(
            "http://rpc.test/status",
            json!({"result": {"node_info": {"network": "testhub-3"}}}),
        );

        let identity = reconcile(&transport, "testhub-1", &endpoint, TIMEOUT)
            .await
            .or_last_live(Some("testhub-2"));

        assert_eq!(identity.effective, "testhub-3");
    }

    #[tokio::test]
    async fn lcd_node_info_is_understood() {
        let endpoint = Endpoint::lcd("http://lcd.test", "t");
        let transport = ScriptedTransport::new().ok(
            &format!("http://lcd.test{LCD_NODE_INFO_PATH}"),
            json!({"default_node_info": {"network": "testhub-3"}, "application_version": {}}),
        );

        let identity = reconcile(&transport, "testhub-1", &endpoint, TIMEOUT).await;

        assert_eq!(identity.live.as_deref(), Some("testhub-3"));
    }
}
