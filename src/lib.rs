pub mod broadcast;
pub mod cache;
pub mod chain;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod failover;
pub mod fee;
pub mod msg;
pub mod orchestrator;
pub mod probe;
pub mod reconcile;
pub mod transport;
pub mod txs;
pub mod types;
pub mod units;
pub mod utils;
pub mod wallet;

pub type Result<O> = anyhow::Result<O>;

pub const CHAIN_DATA_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/chains.yaml");
