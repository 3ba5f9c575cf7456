use thiserror::Error;

use crate::chain::Endpoint;

/// Why a single endpoint attempt was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("timed out")]
    Timeout,
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    /// Well-formed response carrying an empty collection where data was expected.
    #[error("empty payload")]
    EmptyPayload,
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} ({}): {}", .endpoint.url, .endpoint.provider, .reason)]
pub struct EndpointError {
    pub endpoint: Endpoint,
    pub reason: FailureReason,
}

/// Every endpoint of a failover run failed. `attempts` keeps them in the order tried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all {} endpoint(s) failed", .attempts.len())]
pub struct AggregateFailure {
    pub attempts: Vec<EndpointError>,
}

/// Live node reports a different chain id than the catalog. Logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("configured chain id {configured} differs from live chain id {live} reported by {endpoint}")]
pub struct ChainMismatchWarning {
    pub configured: String,
    pub live: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("not an amount: {0:?}")]
    NotAnAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("chain {0} has no endpoints")]
    NoEndpoints(String),
    #[error("chain {chain} has no {kind} endpoint")]
    MissingKind { chain: String, kind: &'static str },
    #[error("chain {chain}: invalid endpoint url {url}")]
    InvalidUrl { chain: String, url: String },
    #[error("chain {chain}: exponent {exponent} is above {max}")]
    ExponentTooLarge { chain: String, exponent: u32, max: u32 },
    #[error("chain {chain}: invalid gas price tiers")]
    InvalidGasPrices { chain: String },
    #[error("unknown chain {0}")]
    UnknownChain(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("signing rejected: {0}")]
    SigningRejected(String),
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("broadcast failed at {0}")]
    Broadcast(EndpointError),
    #[error("broadcast rejected with code {code}: {raw_log}")]
    BroadcastRejected {
        code: u32,
        raw_log: String,
        tx_hash: Option<String>,
    },
    #[error("transaction already submitted by this orchestrator")]
    AlreadySubmitted,
}
