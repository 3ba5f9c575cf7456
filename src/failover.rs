//! Ordered failover across a chain's endpoints.
//!
//! Endpoints are tried strictly one after another in catalog order. The
//! first one that yields a well-formed, non-empty payload wins.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::chain::{Endpoint, ProtocolKind};
use crate::error::{AggregateFailure, EndpointError, FailureReason};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Any well-formed payload is accepted, including empty collections.
    Any,
    /// The value at this JSON pointer must be a non-empty array, object or
    /// string. Nodes serving pruned or degraded data answer with an empty
    /// collection here and are skipped.
    NonEmpty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub path: String,
    pub expect: Expect,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expect: Expect::Any,
        }
    }

    pub fn non_empty(mut self, pointer: &'static str) -> Self {
        self.expect = Expect::NonEmpty(pointer);
        self
    }
}

/// A payload together with the endpoint that served it and every endpoint
/// abandoned before it, in the order tried.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub payload: T,
    pub endpoint: Endpoint,
    pub failures: Vec<EndpointError>,
}

pub async fn resolve<T>(
    transport: &dyn Transport,
    endpoints: &[Endpoint],
    request: &RequestSpec,
    timeout: Duration,
) -> Result<Resolved<T>, AggregateFailure>
where
    T: DeserializeOwned,
{
    let mut attempts = Vec::with_capacity(endpoints.len());

    for endpoint in endpoints {
        match fetch(transport, endpoint, request, timeout).await {
            Ok(payload) => {
                debug!(
                    endpoint = endpoint.url.as_str(),
                    path = request.path.as_str(),
                    failed_before = attempts.len(),
                    "resolved"
                );
                return Ok(Resolved {
                    payload,
                    endpoint: endpoint.clone(),
                    failures: attempts,
                });
            }
            Err(reason) => {
                warn!(
                    endpoint = endpoint.url.as_str(),
                    provider = endpoint.provider.as_str(),
                    path = request.path.as_str(),
                    %reason,
                    "endpoint failed, trying next"
                );
                attempts.push(EndpointError {
                    endpoint: endpoint.clone(),
                    reason,
                });
            }
        }
    }

    warn!(
        path = request.path.as_str(),
        attempts = attempts.len(),
        "every endpoint failed"
    );
    Err(AggregateFailure { attempts })
}

/// One attempt against one endpoint.
pub async fn fetch<T>(
    transport: &dyn Transport,
    endpoint: &Endpoint,
    request: &RequestSpec,
    timeout: Duration,
) -> Result<T, FailureReason>
where
    T: DeserializeOwned,
{
    let body = transport.get(&endpoint.route(&request.path), timeout).await?;

    let payload = match endpoint.kind {
        ProtocolKind::Rpc => unwrap_jsonrpc(body)?,
        ProtocolKind::Lcd => body,
    };

    if let Expect::NonEmpty(pointer) = request.expect {
        if is_empty_at(&payload, pointer) {
            return Err(FailureReason::EmptyPayload);
        }
    }

    serde_json::from_value(payload).map_err(|err| FailureReason::Malformed(err.to_string()))
}

/// Strips the JSON-RPC envelope from a consensus node response.
/// Bodies without an envelope are passed through as they are.
pub fn unwrap_jsonrpc(body: Value) -> Result<Value, FailureReason> {
    match body {
        Value::Object(mut map) => {
            if let Some(error) = map.remove("error").filter(|e| !e.is_null()) {
                return Err(FailureReason::Malformed(format!("rpc error: {error}")));
            }
            Ok(map.remove("result").unwrap_or(Value::Object(map)))
        }
        other => Ok(other),
    }
}

fn is_empty_at(payload: &Value, pointer: &str) -> bool {
    match payload.pointer(pointer) {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(fields)) => fields.is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
