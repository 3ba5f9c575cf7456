use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::chain::{Endpoint, ProtocolKind};
use crate::error::FailureReason;
use crate::failover::unwrap_jsonrpc;
use crate::transport::Transport;
use crate::txs::{encode_tx_bytes, tx_hash};

pub const LCD_BROADCAST_PATH: &str = "/cosmos/tx/v1beta1/txs";

/// What a node said about a submitted transaction. `code == 0` means it
/// passed `CheckTx` and entered the mempool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub code: u32,
    pub hash: String,
    pub raw_log: String,
    pub codespace: String,
}

impl TxOutcome {
    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }
}

#[derive(Deserialize)]
struct RpcBroadcast {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    hash: String,
}

#[derive(Deserialize)]
struct LcdBroadcast {
    tx_response: LcdTxResponse,
}

#[derive(Deserialize)]
struct LcdTxResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    txhash: String,
}

pub fn broadcast_sync_payload(signed_tx: &[u8]) -> Value {
    json!({
        "tx_bytes": encode_tx_bytes(signed_tx),
        "mode": "BROADCAST_MODE_SYNC",
    })
}

pub fn broadcast_tx_sync_request(signed_tx: &[u8]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "broadcast_tx_sync",
        "params": { "tx": encode_tx_bytes(signed_tx) },
    })
}

pub async fn broadcast_via_rest(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    signed_tx: &[u8],
    timeout: Duration,
) -> Result<TxOutcome, FailureReason> {
    let body = transport
        .post(
            &endpoint.route(LCD_BROADCAST_PATH),
            &broadcast_sync_payload(signed_tx),
            timeout,
        )
        .await?;
    let LcdBroadcast { tx_response } = decode(body)?;

    Ok(TxOutcome {
        code: tx_response.code,
        hash: tx_response.txhash,
        raw_log: tx_response.raw_log,
        codespace: tx_response.codespace,
    })
}

pub async fn broadcast_via_tendermint_rpc(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    signed_tx: &[u8],
    timeout: Duration,
) -> Result<TxOutcome, FailureReason> {
    let body = transport
        .post(&endpoint.route(""), &broadcast_tx_sync_request(signed_tx), timeout)
        .await?;
    let response: RpcBroadcast = decode(unwrap_jsonrpc(body)?)?;

    Ok(TxOutcome {
        code: response.code,
        hash: response.hash,
        raw_log: response.log,
        codespace: response.codespace,
    })
}

/// Submits `signed_tx` on the route matching the endpoint's protocol.
/// A node that answers without a hash gets the locally computed one.
pub async fn broadcast(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    signed_tx: &[u8],
    timeout: Duration,
) -> Result<TxOutcome, FailureReason> {
    debug!(endpoint = endpoint.url.as_str(), bytes = signed_tx.len(), "broadcasting");

    let mut outcome = match endpoint.kind {
        ProtocolKind::Rpc => {
            broadcast_via_tendermint_rpc(transport, endpoint, signed_tx, timeout).await?
        }
        ProtocolKind::Lcd => broadcast_via_rest(transport, endpoint, signed_tx, timeout).await?,
    };
    if outcome.hash.is_empty() {
        outcome.hash = tx_hash(signed_tx);
    }

    info!(
        endpoint = endpoint.url.as_str(),
        code = outcome.code,
        hash = outcome.hash.as_str(),
        "broadcast answered"
    );
    Ok(outcome)
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, FailureReason> {
    serde_json::from_value(body).map_err(|err| FailureReason::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::ScriptedTransport;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn rpc_route_posts_json_rpc() {
        let endpoint = Endpoint::rpc("http://rpc.test", "t");
        let transport = ScriptedTransport::new().ok(
            "http://rpc.test",
            json!({"jsonrpc": "2.0", "id": 1, "result": {"code": 0, "log": "", "hash": "ABCD"}}),
        );

        let outcome = broadcast(&transport, &endpoint, b"tx", TIMEOUT).await.unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(outcome.hash, "ABCD");
        let (url, body) = &transport.posted()[0];
        assert_eq!(url, "http://rpc.test");
        assert_eq!(body["method"], "broadcast_tx_sync");
        assert_eq!(body["params"]["tx"], "dHg=");
    }

    #[tokio::test]
    async fn lcd_route_posts_sync_mode() {
        let endpoint = Endpoint::lcd("http://lcd.test", "t");
        let transport = ScriptedTransport::new().ok(
            &format!("http://lcd.test{LCD_BROADCAST_PATH}"),
            json!({"tx_response": {
                "height": "0",
                "txhash": "",
                "code": 5,
                "codespace": "sdk",
                "raw_log": "insufficient funds"
            }}),
        );

        let outcome = broadcast(&transport, &endpoint, b"tx", TIMEOUT).await.unwrap();

        assert!(!outcome.is_accepted());
        assert_eq!(outcome.raw_log, "insufficient funds");
        assert_eq!(outcome.hash, tx_hash(b"tx"));
        assert_eq!(transport.posted()[0].1["mode"], "BROADCAST_MODE_SYNC");
    }

    #[tokio::test]
    async fn rpc_error_member_is_malformed() {
        let endpoint = Endpoint::rpc("http://rpc.test", "t");
        let transport = ScriptedTransport::new().ok(
            "http://rpc.test",
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32603, "message": "tx already exists in cache"}}),
        );

        let err = broadcast(&transport, &endpoint, b"tx", TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, FailureReason::Malformed(_)));
    }
}
