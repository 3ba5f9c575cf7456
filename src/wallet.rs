//! Port to the external signing wallet. The crate never holds key material;
//! it hands unsigned bodies and fees to an [`OfflineSigner`] and gets signed
//! `TxRaw` bytes back.

use async_trait::async_trait;
use cosmos_sdk_proto::cosmos::tx::v1beta1::{Fee, TxBody};
use thiserror::Error;
use tracing::{debug, info};

use crate::chain::ChainProfile;
use crate::error::TxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletKey {
    pub address: String,
    pub pub_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignRequest {
    pub chain_id: String,
    pub signer_address: String,
    pub body: TxBody,
    pub fee: Fee,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The user declined or closed the prompt.
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("wallet does not know chain {0}")]
    UnknownChain(String),
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

impl From<WalletError> for TxError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected(reason) => TxError::SigningRejected(reason),
            other => TxError::Wallet(other.to_string()),
        }
    }
}

#[async_trait]
pub trait OfflineSigner: Send + Sync {
    /// Waits as long as the wallet does; no timeout is imposed here.
    async fn sign(&self, request: SignRequest) -> Result<Vec<u8>, WalletError>;
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn enable(&self, chain_id: &str) -> Result<(), WalletError>;
    async fn get_key(&self, chain_id: &str) -> Result<WalletKey, WalletError>;
    async fn suggest_chain(&self, profile: &ChainProfile) -> Result<(), WalletError>;
    async fn get_offline_signer(&self, chain_id: &str)
        -> Result<Box<dyn OfflineSigner>, WalletError>;
}

/// A connected signer, bound to one chain id.
pub struct SignerSession {
    pub chain_id: String,
    pub key: WalletKey,
    signer: Box<dyn OfflineSigner>,
}

impl std::fmt::Debug for SignerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerSession")
            .field("chain_id", &self.chain_id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl SignerSession {
    /// enable, suggesting the chain first if the wallet has never seen it,
    /// then fetch the key and the offline signer.
    pub async fn establish(
        wallet: &dyn Wallet,
        profile: &ChainProfile,
        chain_id: &str,
    ) -> Result<Self, WalletError> {
        match wallet.enable(chain_id).await {
            Ok(()) => {}
            Err(WalletError::UnknownChain(_)) => {
                info!(chain_id, "suggesting chain to wallet");
                wallet.suggest_chain(&profile.with_chain_id(chain_id)).await?;
                wallet.enable(chain_id).await?;
            }
            Err(err) => return Err(err),
        }

        let key = wallet.get_key(chain_id).await?;
        let signer = wallet.get_offline_signer(chain_id).await?;
        debug!(chain_id, address = key.address.as_str(), "signer session established");

        Ok(Self {
            chain_id: chain_id.into(),
            key,
            signer,
        })
    }

    pub async fn sign(&self, body: TxBody, fee: Fee) -> Result<Vec<u8>, WalletError> {
        self.signer
            .sign(SignRequest {
                chain_id: self.chain_id.clone(),
                signer_address: self.key.address.clone(),
                body,
                fee,
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory wallet recording every call. `known` chains enable directly,
    /// anything else needs a suggest first.
    #[derive(Clone, Default)]
    pub struct MockWallet {
        pub known: Arc<Mutex<Vec<String>>>,
        pub calls: Arc<Mutex<Vec<String>>>,
        pub requests: Arc<Mutex<Vec<SignRequest>>>,
        pub reject: bool,
        pub address: String,
    }

    impl MockWallet {
        pub fn new(address: &str, known: &[&str]) -> Self {
            Self {
                known: Arc::new(Mutex::new(known.iter().map(|s| s.to_string()).collect())),
                address: address.into(),
                ..Default::default()
            }
        }

        pub fn rejecting(mut self) -> Self {
            self.reject = true;
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn requests(&self) -> Vec<SignRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    struct MockSigner {
        wallet: MockWallet,
    }

    #[async_trait]
    impl OfflineSigner for MockSigner {
        async fn sign(&self, request: SignRequest) -> Result<Vec<u8>, WalletError> {
            self.wallet.record(format!("sign:{}", request.chain_id));
            if self.wallet.reject {
                return Err(WalletError::Rejected("user closed the prompt".into()));
            }
            let bytes = format!("signed:{}:{}", request.chain_id, request.body.messages.len());
            self.wallet.requests.lock().unwrap().push(request);
            Ok(bytes.into_bytes())
        }
    }

    #[async_trait]
    impl Wallet for MockWallet {
        async fn enable(&self, chain_id: &str) -> Result<(), WalletError> {
            self.record(format!("enable:{chain_id}"));
            if self.known.lock().unwrap().iter().any(|c| c == chain_id) {
                Ok(())
            } else {
                Err(WalletError::UnknownChain(chain_id.into()))
            }
        }

        async fn get_key(&self, chain_id: &str) -> Result<WalletKey, WalletError> {
            self.record(format!("get_key:{chain_id}"));
            Ok(WalletKey {
                address: self.address.clone(),
                pub_key: vec![2; 33],
            })
        }

        async fn suggest_chain(&self, profile: &ChainProfile) -> Result<(), WalletError> {
            self.record(format!("suggest_chain:{}", profile.chain_id));
            self.known.lock().unwrap().push(profile.chain_id.clone());
            Ok(())
        }

        async fn get_offline_signer(
            &self,
            chain_id: &str,
        ) -> Result<Box<dyn OfflineSigner>, WalletError> {
            self.record(format!("get_offline_signer:{chain_id}"));
            Ok(Box::new(MockSigner {
                wallet: self.clone(),
            }))
        }
    }
}
