use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::fee::GasTier;
use crate::Result;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Rpc,
    Lcd,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpc => "rpc",
            Self::Lcd => "lcd",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub provider: String,
    pub kind: ProtocolKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexer_capable: Option<bool>,
}

impl Endpoint {
    pub fn new(url: &str, provider: &str, kind: ProtocolKind) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            provider: provider.into(),
            kind,
            indexer_capable: None,
        }
    }

    pub fn rpc(url: &str, provider: &str) -> Self {
        Self::new(url, provider, ProtocolKind::Rpc)
    }

    pub fn lcd(url: &str, provider: &str) -> Self {
        Self::new(url, provider, ProtocolKind::Lcd)
    }

    /// Full URL of `path` (which starts with `/`, or is empty for the root) on this endpoint.
    pub fn route(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GasPriceTiers {
    pub low: Decimal,
    pub average: Decimal,
    pub high: Decimal,
}

impl GasPriceTiers {
    pub fn price(&self, tier: GasTier) -> Decimal {
        match tier {
            GasTier::Low => self.low,
            GasTier::Average => self.average,
            GasTier::High => self.high,
        }
    }
}

/// Route the signed transaction takes to the chain.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BroadcastRoute {
    #[default]
    Rpc,
    Lcd,
}

/// Largest display exponent a catalog may declare. Unit conversion pads to
/// this many digits.
pub const MAX_EXPONENT: u32 = 30;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChainProfile {
    pub chain_id: String,
    pub name: String,
    pub address_prefix: String,
    pub base_denom: String,
    pub display_denom: String,
    pub exponent: u32,
    pub coin_type: u64,
    pub gas_price_tiers: GasPriceTiers,

    #[serde(default)]
    pub broadcast: BroadcastRoute,

    pub endpoints: Vec<Endpoint>,
}

impl ChainProfile {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints(self.chain_id.clone()));
        }
        for endpoint in &self.endpoints {
            Url::parse(&endpoint.url).map_err(|_| ConfigError::InvalidUrl {
                chain: self.chain_id.clone(),
                url: endpoint.url.clone(),
            })?;
        }
        for kind in [ProtocolKind::Rpc, ProtocolKind::Lcd] {
            if !self.endpoints.iter().any(|e| e.kind == kind) {
                return Err(ConfigError::MissingKind {
                    chain: self.chain_id.clone(),
                    kind: kind.as_str(),
                });
            }
        }
        if self.exponent > MAX_EXPONENT {
            return Err(ConfigError::ExponentTooLarge {
                chain: self.chain_id.clone(),
                exponent: self.exponent,
                max: MAX_EXPONENT,
            });
        }
        let tiers = &self.gas_price_tiers;
        if [tiers.low, tiers.average, tiers.high]
            .iter()
            .any(|price| price.is_sign_negative())
        {
            return Err(ConfigError::InvalidGasPrices {
                chain: self.chain_id.clone(),
            });
        }
        Ok(())
    }

    pub fn endpoints_of(&self, kind: ProtocolKind) -> Vec<Endpoint> {
        self.endpoints
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn rpc_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints_of(ProtocolKind::Rpc)
    }

    pub fn lcd_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints_of(ProtocolKind::Lcd)
    }

    /// Copy of this profile under another chain id, as handed to a wallet
    /// that has to learn the live chain.
    pub fn with_chain_id(&self, chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.into(),
            ..self.clone()
        }
    }
}

/// Chain profiles keyed by short chain name (`cosmoshub`, `osmosis`, ...).
pub type Catalog = HashMap<String, ChainProfile>;

pub fn load_catalog(path: &str) -> Result<Catalog> {
    let catalog: Catalog = crate::utils::read_data_from_yaml(path)?;
    for (name, profile) in &catalog {
        profile.validate()?;
        tracing::debug!(
            chain = name.as_str(),
            endpoints = profile.endpoints.len(),
            "loaded chain profile"
        );
    }
    Ok(catalog)
}

pub fn lookup<'a>(
    catalog: &'a Catalog,
    name: &str,
) -> std::result::Result<&'a ChainProfile, ConfigError> {
    catalog
        .get(name)
        .or_else(|| catalog.values().find(|p| p.chain_id == name))
        .ok_or_else(|| ConfigError::UnknownChain(name.into()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::str::FromStr;

    pub fn profile() -> ChainProfile {
        ChainProfile {
            chain_id: "testhub-1".into(),
            name: "Test Hub".into(),
            address_prefix: "cosmos".into(),
            base_denom: "uatom".into(),
            display_denom: "ATOM".into(),
            exponent: 6,
            coin_type: 118,
            gas_price_tiers: GasPriceTiers {
                low: Decimal::from_str("0.01").unwrap(),
                average: Decimal::from_str("0.025").unwrap(),
                high: Decimal::from_str("0.04").unwrap(),
            },
            broadcast: BroadcastRoute::Rpc,
            endpoints: vec![
                Endpoint::rpc("http://rpc-a.test", "alpha"),
                Endpoint::rpc("http://rpc-b.test", "beta"),
                Endpoint::lcd("http://lcd-a.test", "alpha"),
            ],
        }
    }
}
