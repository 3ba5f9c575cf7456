use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chain::{Endpoint, ProtocolKind};
use crate::failover::{fetch, RequestSpec};
use crate::transport::Transport;
use crate::types::NodeStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub endpoint: Endpoint,
    /// `false` when no endpoint had transaction indexing and `endpoint` is
    /// the first-endpoint fallback. Indexed-only views may be degraded.
    pub indexed: bool,
}

/// First RPC endpoint whose node reports `tx_index: on`, checked one by one
/// in catalog order. Endpoints the catalog marks `indexer_capable: false`
/// are not asked. Falls back to `endpoints[0]`; `None` only for an empty list.
pub async fn find_capable(
    transport: &dyn Transport,
    endpoints: &[Endpoint],
    timeout: Duration,
) -> Option<Probe> {
    let status_request = RequestSpec::get("/status");

    let candidates = endpoints
        .iter()
        .filter(|e| e.kind == ProtocolKind::Rpc && e.indexer_capable != Some(false));

    for endpoint in candidates {
        match fetch::<NodeStatus>(transport, endpoint, &status_request, timeout).await {
            Ok(status) if status.tx_index_enabled() => {
                info!(endpoint = endpoint.url.as_str(), "tx indexer available");
                return Some(Probe {
                    endpoint: endpoint.clone(),
                    indexed: true,
                });
            }
            Ok(_) => debug!(endpoint = endpoint.url.as_str(), "tx indexer disabled"),
            Err(reason) => warn!(endpoint = endpoint.url.as_str(), %reason, "status probe failed"),
        }
    }

    let fallback = endpoints.first()?.clone();
    warn!(
        endpoint = fallback.url.as_str(),
        "no endpoint has tx indexing, indexed views may be degraded"
    );
    Some(Probe {
        endpoint: fallback,
        indexed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::transport::scripted::ScriptedTransport;
    use serde_json::{json, Value};

    fn status(tx_index: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "node_info": {"network": "testhub-1", "other": {"tx_index": tx_index}},
                "sync_info": {"latest_block_height": "10"}
            }
        })
    }

    fn endpoints() -> Vec<Endpoint> {
        (0..4)
            .map(|ix| Endpoint::rpc(&format!("http://n{ix}.test"), &format!("n{ix}")))
            .collect()
    }

    #[tokio::test]
    async fn selects_the_only_indexed_endpoint() {
        let transport = ScriptedTransport::new()
            .ok("http://n0.test/status", status("off"))
            .fail("http://n1.test/status", FailureReason::Timeout)
            .ok("http://n2.test/status", status("on"))
            .ok("http://n3.test/status", status("on"));
        let endpoints = endpoints();

        let probe = find_capable(&transport, &endpoints, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(probe.endpoint, endpoints[2]);
        assert!(probe.indexed);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn falls_back_to_first_endpoint() {
        let transport = ScriptedTransport::new()
            .ok("http://n0.test/status", status("off"))
            .ok("http://n1.test/status", status("off"));
        let endpoints = endpoints();

        let probe = find_capable(&transport, &endpoints, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(probe.endpoint, endpoints[0]);
        assert!(!probe.indexed);
    }

    #[tokio::test]
    async fn catalog_hint_skips_known_pruned_nodes() {
        let transport = ScriptedTransport::new().ok("http://n1.test/status", status("on"));
        let mut endpoints = endpoints();
        endpoints[0].indexer_capable = Some(false);

        let probe = find_capable(&transport, &endpoints, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(probe.endpoint, endpoints[1]);
        assert_eq!(transport.calls(), vec!["http://n1.test/status"]);
    }

    #[tokio::test]
    async fn empty_list_has_no_probe() {
        let transport = ScriptedTransport::new();
        assert_eq!(find_capable(&transport, &[], Duration::from_secs(1)).await, None);
    }
}
