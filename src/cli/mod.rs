use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::cache::{Freshness, Served};
use crate::chain::{load_catalog, lookup, Catalog, ChainProfile};
use crate::client::ChainClient;
use crate::config::Settings;
use crate::failover::Resolved;
use crate::fee::{compute_fee, gas_price, GasTier};
use crate::msg::{compose, validate_addresses};
use crate::units::{to_base, to_display};
use crate::Result;

pub mod tx;
pub mod utils;

use utils::custom_gas_price;

#[derive(Parser, Debug)]
#[command(version, about)]
pub enum Args {
    /// Chains in the catalog.
    Chains,
    /// Node status of one chain, or of every catalog chain at once.
    Status {
        chain: Option<String>,
    },
    /// Finds an RPC endpoint with transaction indexing.
    Probe {
        chain: String,
    },
    /// Compares the configured chain id with the live one.
    Reconcile {
        chain: String,
    },
    Query {
        chain: String,
        #[command(subcommand)]
        query: Query,
    },
    Convert {
        chain: String,
        amount: String,
        /// Treat `amount` as display units and print base units.
        #[arg(long)]
        to_base: bool,
    },
    Fee {
        chain: String,
        gas: u64,
        #[arg(long, value_enum)]
        tier: Option<GasTier>,
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Builds the messages and fee of a transaction without signing it.
    Compose {
        chain: String,
        #[arg(long)]
        gas: Option<u64>,
        #[arg(long, value_enum)]
        tier: Option<GasTier>,
        #[arg(long)]
        price: Option<Decimal>,
        #[arg(long, default_value = "")]
        memo: String,
        #[command(subcommand)]
        transaction: tx::Transaction,
    },
}

#[derive(Subcommand, Debug)]
pub enum Query {
    Block {
        height: Option<u64>,
    },
    ValidatorSet {
        #[arg(long, default_value_t = 100)]
        per_page: u32,
    },
    ConsensusState,
    Validators,
    Delegations {
        address: String,
    },
    Unbonding {
        address: String,
    },
    Rewards {
        address: String,
    },
    Commission {
        validator: String,
    },
    Balances {
        address: String,
    },
    Proposals,
    Params {
        module: String,
    },
    Account {
        address: String,
    },
    Txs {
        #[arg(required = true)]
        events: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Tx {
        hash: String,
    },
}

impl Args {
    pub async fn run(&self) -> crate::Result<()> {
        let settings = Settings::load()?;
        let catalog_path = settings.catalog_path()?;
        let catalog: Catalog = load_catalog(&catalog_path)
            .with_context(|| format!("loading chain catalog {catalog_path}"))?;

        match &self {
            Self::Chains => {
                let mut names: Vec<_> = catalog.keys().collect();
                names.sort();
                for name in names {
                    let profile = &catalog[name];
                    println!(
                        "{name} : {} ({}, {} endpoints)",
                        profile.chain_id,
                        profile.display_denom,
                        profile.endpoints.len()
                    );
                }
                Ok(())
            }
            Self::Status { chain: Some(chain) } => {
                let client = connect(&catalog, chain, &settings)?;
                print_status(chain, &client).await
            }
            Self::Status { chain: None } => {
                let mut names: Vec<_> = catalog.keys().cloned().collect();
                names.sort();
                let clients = names
                    .iter()
                    .map(|name| connect(&catalog, name, &settings))
                    .collect::<Result<Vec<_>>>()?;
                let results = futures::future::join_all(
                    names
                        .iter()
                        .zip(&clients)
                        .map(|(name, client)| print_status(name, client)),
                )
                .await;
                for (name, result) in names.iter().zip(results) {
                    if let Err(err) = result {
                        eprintln!("{name} : {err}");
                    }
                }
                Ok(())
            }
            Self::Probe { chain } => {
                let client = connect(&catalog, chain, &settings)?;
                let probe = client
                    .probe_indexer()
                    .await
                    .context("chain has no rpc endpoint")?;
                println!(
                    "{} : {}",
                    probe.endpoint.url,
                    if probe.indexed { "indexed" } else { "not indexed" }
                );
                Ok(())
            }
            Self::Reconcile { chain } => {
                let client = connect(&catalog, chain, &settings)?;
                let endpoint = client
                    .broadcast_endpoint()
                    .await
                    .context("chain has no broadcast endpoint")?;
                let identity = client.identity(&endpoint).await;
                print_json(&json!({
                    "endpoint": endpoint.url,
                    "configured": identity.configured,
                    "live": identity.live,
                    "effective": identity.effective,
                    "mismatched": identity.mismatched(),
                }))
            }
            Self::Query { chain, query } => {
                let client = connect(&catalog, chain, &settings)?;
                query.run(&client).await
            }
            Self::Convert {
                chain,
                amount,
                to_base: display_to_base,
            } => {
                let profile = lookup(&catalog, chain)?;
                if *display_to_base {
                    println!("{}{}", to_base(amount, profile.exponent)?, profile.base_denom);
                } else {
                    println!(
                        "{} {}",
                        to_display(amount, profile.exponent)?,
                        profile.display_denom
                    );
                }
                Ok(())
            }
            Self::Fee {
                chain,
                gas,
                tier,
                price,
            } => {
                let profile = lookup(&catalog, chain)?;
                let price = gas_price(&profile.gas_price_tiers, custom_gas_price(*tier, *price));
                let coin = compute_fee(*gas, price, &profile.base_denom)?;
                println!(
                    "{}{} ({} {})",
                    coin.amount,
                    coin.denom,
                    to_display(&coin.amount, profile.exponent)?,
                    profile.display_denom
                );
                Ok(())
            }
            Self::Compose {
                chain,
                gas,
                tier,
                price,
                memo,
                transaction,
            } => {
                let profile = lookup(&catalog, chain)?;
                let intent = match transaction {
                    tx::Transaction::WithdrawAllValidators {
                        delegator,
                        validators,
                    } if validators.is_empty() => {
                        ChainClient::connect(profile.clone(), settings.clone())
                            .withdraw_all_rewards(delegator)
                            .await?
                    }
                    transaction => transaction.to_intent(profile)?,
                };
                validate_addresses(&intent, &profile.address_prefix)?;
                let msgs = compose(&intent, &profile.base_denom)?;
                let gas = gas.unwrap_or_else(|| intent.suggested_gas_limit());
                let price = gas_price(&profile.gas_price_tiers, custom_gas_price(*tier, *price));
                let fee = compute_fee(gas, price, &profile.base_denom)?;

                print_json(&json!({
                    "chain_id": profile.chain_id,
                    "intent": intent,
                    "body": {
                        "messages": msgs.iter().map(|m| m.to_json()).collect::<Vec<_>>(),
                        "memo": memo,
                    },
                    "fee": {
                        "amount": [{"denom": fee.denom, "amount": fee.amount}],
                        "gas": gas.to_string(),
                    },
                }))
            }
        }
    }
}

impl Query {
    pub async fn run(&self, client: &ChainClient) -> Result<()> {
        match self {
            Self::Block { height } => {
                let read = match height {
                    Some(height) => client.block(*height),
                    None => client.latest_block(),
                };
                print_served(read.load().await?)
            }
            Self::ValidatorSet { per_page } => {
                print_served(client.validator_set(*per_page).load().await?)
            }
            Self::ConsensusState => print_served(client.consensus_state().load().await?),
            Self::Validators => {
                let served = client.validators().load().await?;
                for validator in &served.payload.validators {
                    println!(
                        "{} : {} ({} {})",
                        validator.operator_address,
                        validator.description.moniker,
                        to_display(&validator.tokens, client.profile.exponent)
                            .unwrap_or_else(|_| validator.tokens.clone()),
                        client.profile.display_denom
                    );
                }
                note_staleness(&served);
                Ok(())
            }
            Self::Delegations { address } => {
                print_served(client.delegations(address).load().await?)
            }
            Self::Unbonding { address } => {
                print_served(client.unbonding_delegations(address).load().await?)
            }
            Self::Rewards { address } => print_served(client.rewards(address).load().await?),
            Self::Commission { validator } => {
                print_served(client.commission(validator).load().await?)
            }
            Self::Balances { address } => {
                let served = client.balances(address).load().await?;
                for token in &served.payload.balances {
                    println!("{}", display_token(&client.profile, &token.denom, &token.amount));
                }
                note_staleness(&served);
                Ok(())
            }
            Self::Proposals => print_served(client.proposals().load().await?),
            Self::Params { module } => print_served(client.params(module).load().await?),
            Self::Account { address } => print_served(client.account(address).load().await?),
            Self::Txs { events, limit } => {
                let events: Vec<&str> = events.iter().map(String::as_str).collect();
                print_served(client.search_txs(&events, *limit).load().await?)
            }
            Self::Tx { hash } => print_served(client.tx(hash).load().await?),
        }
    }
}

fn connect(catalog: &Catalog, chain: &str, settings: &Settings) -> Result<ChainClient> {
    let profile = lookup(catalog, chain)?.clone();
    Ok(ChainClient::connect(profile, settings.clone()))
}

async fn print_status(name: &str, client: &ChainClient) -> Result<()> {
    let Resolved {
        payload: status,
        endpoint,
        failures,
    } = client.status().fetch().await?;
    println!(
        "{name} : {} at height {} via {} (tx_index {})",
        status.node_info.network,
        status.latest_height().unwrap_or_default(),
        endpoint.url,
        status.node_info.other.tx_index
    );
    for failure in &failures {
        println!("{name} : skipped {failure}");
    }
    Ok(())
}

fn display_token(profile: &ChainProfile, denom: &str, amount: &str) -> String {
    if denom == profile.base_denom {
        if let Ok(display) = to_display(amount, profile.exponent) {
            return format!("{display} {}", profile.display_denom);
        }
    }
    format!("{amount}{denom}")
}

fn note_staleness<T>(served: &Served<T>) {
    if served.freshness == Freshness::Stale {
        if let Some(failure) = &served.failure {
            eprintln!("stale data, {failure}");
            for attempt in &failure.attempts {
                eprintln!("  {attempt}");
            }
        }
    }
}

fn print_served<T: Serialize>(served: Served<T>) -> Result<()> {
    note_staleness(&served);
    print_json(&served.payload)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fixtures::profile;

    #[test]
    fn base_denom_is_shown_in_display_units() {
        let profile = profile();
        assert_eq!(display_token(&profile, "uatom", "2500000"), "2.5 ATOM");
        assert_eq!(display_token(&profile, "ibc/27394", "7"), "7ibc/27394");
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "deck", "compose", "cosmoshub", "--tier", "high", "vote", "cosmos1me", "3:yes",
        ])
        .unwrap();
        assert!(matches!(
            args,
            Args::Compose {
                tier: Some(GasTier::High),
                ..
            }
        ));
    }
}
