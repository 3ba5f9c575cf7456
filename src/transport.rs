//! HTTP seam shared by every read and broadcast path.
//!
//! Each call carries its own timeout; a timeout is reported as
//! [`FailureReason::Timeout`], never folded into a generic network error.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FailureReason;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<Value, FailureReason>;

    async fn post(&self, url: &str, body: &Value, timeout: Duration)
        -> Result<Value, FailureReason>;
}

/// Blocking `ureq` client driven from the tokio blocking pool.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .user_agent(concat!("deck/", env!("CARGO_PKG_VERSION")))
                .build(),
        }
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<Value, FailureReason> {
        let request = self.agent.get(url).timeout(timeout);
        run_blocking(timeout, move || request.call()).await
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, FailureReason> {
        let request = self.agent.post(url).timeout(timeout);
        let body = body.clone();
        run_blocking(timeout, move || request.send_json(body)).await
    }
}

async fn run_blocking<F>(timeout: Duration, call: F) -> Result<Value, FailureReason>
where
    F: FnOnce() -> Result<ureq::Response, ureq::Error> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || call().map_err(classify).and_then(read_json));

    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(FailureReason::Timeout),
        Ok(Err(join_error)) => Err(FailureReason::NetworkFailure(join_error.to_string())),
        Ok(Ok(result)) => result,
    }
}

fn classify(err: ureq::Error) -> FailureReason {
    match err {
        ureq::Error::Status(code, _) => FailureReason::HttpStatus(code),
        ureq::Error::Transport(transport) => {
            let timed_out = std::error::Error::source(&transport)
                .and_then(|source| source.downcast_ref::<io::Error>())
                .is_some_and(is_timeout);
            if timed_out {
                FailureReason::Timeout
            } else {
                FailureReason::NetworkFailure(transport.to_string())
            }
        }
    }
}

fn read_json(response: ureq::Response) -> Result<Value, FailureReason> {
    response.into_json::<Value>().map_err(|err| {
        if is_timeout(&err) {
            FailureReason::Timeout
        } else {
            FailureReason::Malformed(err.to_string())
        }
    })
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}
