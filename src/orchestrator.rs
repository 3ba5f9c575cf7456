//! Drives one transaction from intent to chain answer:
//! `Idle -> Composing -> IdentityCheck -> Signing -> Broadcasting -> Confirmed | Failed`.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::broadcast::broadcast;
use crate::chain::{ChainProfile, Endpoint};
use crate::config::Settings;
use crate::error::{EndpointError, TxError};
use crate::fee::{compute_fee, gas_price, to_fee, GasPrice};
use crate::msg::{compose, validate_addresses, TransactionIntent};
use crate::reconcile::reconcile;
use crate::transport::Transport;
use crate::txs::generate_tx_body;
use crate::wallet::{SignerSession, Wallet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Composing,
    IdentityCheck,
    Signing,
    Broadcasting,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastResult {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub raw_log: Option<String>,
    pub error_message: Option<String>,
}

impl BroadcastResult {
    fn failed(err: &TxError) -> Self {
        let (tx_hash, raw_log) = match err {
            TxError::BroadcastRejected {
                tx_hash, raw_log, ..
            } => (tx_hash.clone(), Some(raw_log.clone())),
            _ => (None, None),
        };
        Self {
            success: false,
            tx_hash,
            raw_log,
            error_message: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOptions {
    pub gas_limit: u64,
    /// Average tier of the chain when `None`.
    pub gas_price: Option<GasPrice>,
    pub memo: String,
}

impl SubmitOptions {
    pub fn new(gas_limit: u64) -> Self {
        Self {
            gas_limit,
            gas_price: None,
            memo: String::new(),
        }
    }

    pub fn for_intent(intent: &TransactionIntent) -> Self {
        Self::new(intent.suggested_gas_limit())
    }
}

/// Single-use: a second `submit` is refused, resubmission needs a new instance.
pub struct Orchestrator<'a> {
    profile: &'a ChainProfile,
    transport: &'a dyn Transport,
    wallet: &'a dyn Wallet,
    endpoint: Endpoint,
    status_timeout: Duration,
    broadcast_timeout: Duration,
    session: Option<SignerSession>,
    phase: Phase,
    history: Vec<Phase>,
    error: Option<TxError>,
}

impl<'a> Orchestrator<'a> {
    /// `endpoint` serves both the chain id check and the broadcast.
    pub fn new(
        profile: &'a ChainProfile,
        transport: &'a dyn Transport,
        wallet: &'a dyn Wallet,
        endpoint: Endpoint,
        settings: &Settings,
    ) -> Self {
        Self {
            profile,
            transport,
            wallet,
            endpoint,
            status_timeout: settings.status_timeout(),
            broadcast_timeout: settings.broadcast_timeout(),
            session: None,
            phase: Phase::Idle,
            history: vec![Phase::Idle],
            error: None,
        }
    }

    /// Reuses a signer session from an earlier transaction.
    pub fn with_session(mut self, session: SignerSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn error(&self) -> Option<&TxError> {
        self.error.as_ref()
    }

    /// Hands the signer session back for the next transaction.
    pub fn into_session(self) -> Option<SignerSession> {
        self.session
    }

    pub async fn submit(
        &mut self,
        intent: &TransactionIntent,
        options: &SubmitOptions,
    ) -> BroadcastResult {
        if self.phase != Phase::Idle {
            return BroadcastResult::failed(&TxError::AlreadySubmitted);
        }

        match self.run(intent, options).await {
            Ok(tx_hash) => {
                self.enter(Phase::Confirmed);
                info!(intent = intent.name(), tx_hash = tx_hash.as_str(), "transaction confirmed");
                BroadcastResult {
                    success: true,
                    tx_hash: Some(tx_hash),
                    ..Default::default()
                }
            }
            Err(err) => {
                let result = BroadcastResult::failed(&err);
                warn!(intent = intent.name(), phase = ?self.phase, %err, "transaction failed");
                self.enter(Phase::Failed);
                self.error = Some(err);
                result
            }
        }
    }

    async fn run(
        &mut self,
        intent: &TransactionIntent,
        options: &SubmitOptions,
    ) -> Result<String, TxError> {
        self.enter(Phase::Composing);
        validate_addresses(intent, &self.profile.address_prefix)?;
        let msgs = compose(intent, &self.profile.base_denom)?;
        let price = gas_price(&self.profile.gas_price_tiers, options.gas_price);
        let fee = to_fee(
            compute_fee(options.gas_limit, price, &self.profile.base_denom)?,
            options.gas_limit,
        );
        let body = generate_tx_body(&msgs, &options.memo);

        self.enter(Phase::IdentityCheck);
        let identity = reconcile(
            self.transport,
            &self.profile.chain_id,
            &self.endpoint,
            self.status_timeout,
        )
        .await
        .or_last_live(self.session.as_ref().map(|s| s.chain_id.as_str()));

        self.enter(Phase::Signing);
        let session = match self.session.take() {
            Some(session) if session.chain_id == identity.effective => session,
            stale => {
                if let Some(stale) = stale {
                    info!(
                        from = stale.chain_id.as_str(),
                        to = identity.effective.as_str(),
                        "re-establishing signer session"
                    );
                }
                SignerSession::establish(self.wallet, self.profile, &identity.effective).await?
            }
        };
        let signed = session.sign(body, fee).await;
        self.session = Some(session);
        let signed = signed?;

        self.enter(Phase::Broadcasting);
        let outcome = broadcast(self.transport, &self.endpoint, &signed, self.broadcast_timeout)
            .await
            .map_err(|reason| {
                TxError::Broadcast(EndpointError {
                    endpoint: self.endpoint.clone(),
                    reason,
                })
            })?;

        if !outcome.is_accepted() {
            return Err(TxError::BroadcastRejected {
                code: outcome.code,
                raw_log: outcome.raw_log,
                tx_hash: Some(outcome.hash),
            });
        }
        Ok(outcome.hash)
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.history.push(phase);
    }
}
