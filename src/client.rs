//! Typed read facade over one chain: every route goes through the read cache
//! and the failover resolver.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, ReadCache, Served, Swr};
use crate::chain::{BroadcastRoute, ChainProfile, Endpoint};
use crate::config::Settings;
use crate::error::AggregateFailure;
use crate::failover::{resolve, RequestSpec, Resolved};
use crate::msg::TransactionIntent;
use crate::probe::{find_capable, Probe};
use crate::reconcile::{reconcile, ChainIdentity};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    BalancesResponse, CommissionResponse, DelegationsResponse, NodeStatus, ProposalsResponse,
    RewardsResponse, ValidatorsResponse,
};

pub struct ChainClient {
    pub profile: ChainProfile,
    transport: Arc<dyn Transport>,
    cache: ReadCache,
    settings: Settings,
}

/// One read route, not yet sent. Choose how to serve it: [`Read::load`],
/// [`Read::swr`], [`Read::cached`] or straight [`Read::fetch`].
pub struct Read<'c, T> {
    client: &'c ChainClient,
    endpoints: Vec<Endpoint>,
    request: RequestSpec,
    timeout: Duration,
    payload: PhantomData<fn() -> T>,
}

impl<'c, T> Read<'c, T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// `{chain_id}:{path}`, so two chains never share an entry.
    pub fn key(&self) -> String {
        format!("{}:{}", self.client.profile.chain_id, self.request.path)
    }

    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Bypasses the cache.
    pub async fn fetch(&self) -> Result<Resolved<T>, AggregateFailure> {
        resolve(
            self.client.transport.as_ref(),
            &self.endpoints,
            &self.request,
            self.timeout,
        )
        .await
    }

    /// Network first, the cached entry when every endpoint fails.
    pub async fn load(self) -> Result<Served<T>, AggregateFailure> {
        let key = self.key();
        let fetch = async { self.fetch().await.map(|resolved| resolved.payload) };
        self.client.cache.load(&key, fetch).await
    }

    /// Cached entry for immediate rendering, refresh running in the background.
    pub fn swr(self) -> Swr<T> {
        let key = self.key();
        let transport = Arc::clone(&self.client.transport);
        let Self {
            client,
            endpoints,
            request,
            timeout,
            ..
        } = self;
        client.cache.swr(&key, async move {
            resolve(transport.as_ref(), &endpoints, &request, timeout)
                .await
                .map(|resolved: Resolved<T>| resolved.payload)
        })
    }

    /// Whatever is cached, at any age.
    pub fn cached(&self) -> Option<CacheEntry<T>> {
        self.client.cache.get(&self.key())
    }

    /// Cached payload younger than the configured TTL.
    pub fn fresh(&self) -> Option<T> {
        self.client
            .cache
            .get_fresh(&self.key(), self.client.settings.cache_ttl())
    }
}

impl ChainClient {
    /// Purges entries `cache` holds under an older schema before first use.
    pub fn new(
        profile: ChainProfile,
        transport: Arc<dyn Transport>,
        cache: ReadCache,
        settings: Settings,
    ) -> Self {
        cache.migrate();
        Self {
            profile,
            transport,
            cache,
            settings,
        }
    }

    /// Production wiring: ureq transport and an in-memory cache.
    pub fn connect(profile: ChainProfile, settings: Settings) -> Self {
        let cache = ReadCache::in_memory(settings.cache_schema_version);
        Self::new(profile, Arc::new(UreqTransport::new()), cache, settings)
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn rpc<T>(&self, request: RequestSpec, timeout: Duration) -> Read<'_, T> {
        self.read(self.profile.rpc_endpoints(), request, timeout)
    }

    fn lcd<T>(&self, request: RequestSpec) -> Read<'_, T> {
        self.read(
            self.profile.lcd_endpoints(),
            request,
            self.settings.query_timeout(),
        )
    }

    fn read<T>(
        &self,
        endpoints: Vec<Endpoint>,
        request: RequestSpec,
        timeout: Duration,
    ) -> Read<'_, T> {
        Read {
            client: self,
            endpoints,
            request,
            timeout,
            payload: PhantomData,
        }
    }

    pub fn status(&self) -> Read<'_, NodeStatus> {
        self.rpc(RequestSpec::get("/status"), self.settings.status_timeout())
    }

    pub fn latest_block(&self) -> Read<'_, Value> {
        self.rpc(
            RequestSpec::get("/block").non_empty("/block"),
            self.settings.query_timeout(),
        )
    }

    pub fn block(&self, height: u64) -> Read<'_, Value> {
        self.rpc(
            RequestSpec::get(format!("/block?height={height}")).non_empty("/block"),
            self.settings.query_timeout(),
        )
    }

    pub fn validator_set(&self, per_page: u32) -> Read<'_, Value> {
        self.rpc(
            RequestSpec::get(format!("/validators?per_page={per_page}")).non_empty("/validators"),
            self.settings.query_timeout(),
        )
    }

    pub fn consensus_state(&self) -> Read<'_, Value> {
        self.rpc(
            RequestSpec::get("/consensus_state").non_empty("/round_state"),
            self.settings.query_timeout(),
        )
    }

    pub fn validators(&self) -> Read<'_, ValidatorsResponse> {
        self.lcd(
            RequestSpec::get("/cosmos/staking/v1beta1/validators?pagination.limit=500")
                .non_empty("/validators"),
        )
    }

    pub fn delegations(&self, delegator: &str) -> Read<'_, DelegationsResponse> {
        self.lcd(RequestSpec::get(format!(
            "/cosmos/staking/v1beta1/delegations/{delegator}"
        )))
    }

    pub fn unbonding_delegations(&self, delegator: &str) -> Read<'_, Value> {
        self.lcd(RequestSpec::get(format!(
            "/cosmos/staking/v1beta1/delegators/{delegator}/unbonding_delegations"
        )))
    }

    pub fn rewards(&self, delegator: &str) -> Read<'_, RewardsResponse> {
        self.lcd(RequestSpec::get(format!(
            "/cosmos/distribution/v1beta1/delegators/{delegator}/rewards"
        )))
    }

    pub fn commission(&self, validator: &str) -> Read<'_, CommissionResponse> {
        self.lcd(RequestSpec::get(format!(
            "/cosmos/distribution/v1beta1/validators/{validator}/commission"
        )))
    }

    pub fn balances(&self, address: &str) -> Read<'_, BalancesResponse> {
        self.lcd(RequestSpec::get(format!(
            "/cosmos/bank/v1beta1/balances/{address}"
        )))
    }

    pub fn proposals(&self) -> Read<'_, ProposalsResponse> {
        self.lcd(RequestSpec::get(
            "/cosmos/gov/v1beta1/proposals?pagination.reverse=true",
        ))
    }

    /// `module` is `staking`, `distribution`, `slashing`, `mint`, ...
    pub fn params(&self, module: &str) -> Read<'_, Value> {
        self.lcd(RequestSpec::get(format!("/cosmos/{module}/v1beta1/params")))
    }

    pub fn account(&self, address: &str) -> Read<'_, Value> {
        self.lcd(RequestSpec::get(format!(
            "/cosmos/auth/v1beta1/accounts/{address}"
        )))
    }

    /// Needs an indexing node; see [`ChainClient::probe_indexer`].
    pub fn search_txs(&self, events: &[&str], limit: u32) -> Read<'_, Value> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for event in events {
            query.append_pair("events", event);
        }
        query
            .append_pair("pagination.limit", &limit.to_string())
            .append_pair("order_by", "ORDER_BY_DESC");
        self.lcd(RequestSpec::get(format!(
            "/cosmos/tx/v1beta1/txs?{}",
            query.finish()
        )))
    }

    pub fn tx(&self, hash: &str) -> Read<'_, Value> {
        self.lcd(RequestSpec::get(format!("/cosmos/tx/v1beta1/txs/{hash}")))
    }

    /// Withdraw-all intent over every validator currently owing `delegator`.
    pub async fn withdraw_all_rewards(
        &self,
        delegator: &str,
    ) -> Result<TransactionIntent, AggregateFailure> {
        let served = self.rewards(delegator).load().await?;
        Ok(TransactionIntent::WithdrawAllAcrossValidators {
            delegator: delegator.into(),
            validators: served.payload.validators_with_rewards(),
        })
    }

    pub async fn probe_indexer(&self) -> Option<Probe> {
        find_capable(
            self.transport.as_ref(),
            &self.profile.rpc_endpoints(),
            self.settings.status_timeout(),
        )
        .await
    }

    /// Endpoint the next transaction is reconciled against and broadcast to.
    pub async fn broadcast_endpoint(&self) -> Option<Endpoint> {
        let endpoint = match self.profile.broadcast {
            BroadcastRoute::Rpc => self.probe_indexer().await.map(|probe| probe.endpoint),
            BroadcastRoute::Lcd => self.profile.lcd_endpoints().into_iter().next(),
        };
        if let Some(endpoint) = &endpoint {
            debug!(endpoint = endpoint.url.as_str(), "broadcast endpoint chosen");
        }
        endpoint
    }

    pub async fn identity(&self, endpoint: &Endpoint) -> ChainIdentity {
        reconcile(
            self.transport.as_ref(),
            &self.profile.chain_id,
            endpoint,
            self.settings.status_timeout(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::{CacheStore, Freshness, MemoryStore};
    use crate::chain::fixtures::profile;
    use crate::error::FailureReason;
    use crate::transport::scripted::ScriptedTransport;

    const VALIDATORS: &str =
        "/cosmos/staking/v1beta1/validators?pagination.limit=500";

    fn client(transport: Arc<ScriptedTransport>) -> ChainClient {
        ChainClient::new(
            profile(),
            transport,
            ReadCache::in_memory(1),
            Settings::default(),
        )
    }

    fn validators() -> Value {
        json!({"validators": [{
            "operator_address": "cosmosvaloper1abc",
            "status": "BOND_STATUS_BONDED",
            "tokens": "100",
            "description": {"moniker": "alpha"}
        }]})
    }

    #[tokio::test]
    async fn empty_validator_list_fails_over() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .ok(&format!("http://lcd-a.test{VALIDATORS}"), json!({"validators": []})),
        );
        let client = client(transport);

        let failure = client.validators().load().await.unwrap_err();

        assert_eq!(failure.attempts[0].reason, FailureReason::EmptyPayload);
    }

    #[tokio::test]
    async fn empty_delegations_are_a_valid_answer() {
        let transport = Arc::new(ScriptedTransport::new().ok(
            "http://lcd-a.test/cosmos/staking/v1beta1/delegations/cosmos1me",
            json!({"delegation_responses": []}),
        ));
        let client = client(transport);

        let served = client.delegations("cosmos1me").load().await.unwrap();

        assert!(served.payload.delegation_responses.is_empty());
        assert_eq!(served.freshness, Freshness::Live);
    }

    #[tokio::test]
    async fn stale_value_is_served_when_every_endpoint_fails() {
        let url = format!("http://lcd-a.test{VALIDATORS}");
        let transport = Arc::new(ScriptedTransport::new().ok(&url, validators()));
        let client = client(transport.clone());

        client.validators().load().await.unwrap();
        transport.set(&url, Err(FailureReason::HttpStatus(429)));
        let served = client.validators().load().await.unwrap();

        assert_eq!(served.freshness, Freshness::Stale);
        assert_eq!(served.payload.validators[0].operator_address, "cosmosvaloper1abc");
        assert_eq!(
            served.failure.unwrap().attempts[0].reason,
            FailureReason::HttpStatus(429)
        );
    }

    #[tokio::test]
    async fn swr_renders_cache_then_refreshes() {
        let url = format!("http://lcd-a.test{VALIDATORS}");
        let transport = Arc::new(ScriptedTransport::new().ok(&url, validators()));
        let client = client(transport);

        let first = client.validators().swr();
        assert!(first.cached.is_none());
        assert!(first.refresh.await.unwrap().is_some());

        let second = client.validators().swr();
        assert!(second.cached.is_some());
        second.refresh.await.unwrap();
        assert!(client.validators().fresh().is_some());
    }

    #[test]
    fn shared_store_is_migrated_on_construction() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());
        ReadCache::new(store.clone(), 1).set("testhub-1:/status", &json!({}));

        let client = ChainClient::new(
            profile(),
            Arc::new(ScriptedTransport::new()),
            ReadCache::new(store.clone(), 2),
            Settings::default(),
        );

        assert!(store.keys().is_empty());
        assert!(client.status().cached().is_none());
    }

    #[test]
    fn keys_are_scoped_by_chain() {
        let client = client(Arc::new(ScriptedTransport::new()));
        assert_eq!(client.status().key(), "testhub-1:/status");
    }

    #[test]
    fn tx_search_encodes_events() {
        let client = client(Arc::new(ScriptedTransport::new()));
        let read = client.search_txs(&["message.sender='cosmos1me'"], 20);
        assert_eq!(
            read.path(),
            "/cosmos/tx/v1beta1/txs?events=message.sender%3D%27cosmos1me%27&pagination.limit=20&order_by=ORDER_BY_DESC"
        );
    }

    #[tokio::test]
    async fn rpc_reads_unwrap_the_envelope() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail("http://rpc-a.test/block?height=5", FailureReason::Timeout)
                .ok(
                    "http://rpc-b.test/block?height=5",
                    json!({"jsonrpc": "2.0", "id": -1, "result": {"block": {"header": {"height": "5"}}}}),
                ),
        );
        let client = client(transport);

        let resolved = client.block(5).fetch().await.unwrap();

        assert_eq!(resolved.payload["block"]["header"]["height"], "5");
        assert_eq!(resolved.endpoint.provider, "beta");
        assert_eq!(resolved.failures[0].reason, FailureReason::Timeout);
    }

    #[tokio::test]
    async fn withdraw_all_targets_owing_validators() {
        let transport = Arc::new(ScriptedTransport::new().ok(
            "http://lcd-a.test/cosmos/distribution/v1beta1/delegators/cosmos1me/rewards",
            json!({"rewards": [
                {"validator_address": "cosmosvaloper1a", "reward": [{"denom": "uatom", "amount": "3.2"}]},
                {"validator_address": "cosmosvaloper1b", "reward": []}
            ]}),
        ));
        let client = client(transport);

        let intent = client.withdraw_all_rewards("cosmos1me").await.unwrap();

        assert_eq!(
            intent,
            TransactionIntent::WithdrawAllAcrossValidators {
                delegator: "cosmos1me".into(),
                validators: vec!["cosmosvaloper1a".into()],
            }
        );
    }

    #[tokio::test]
    async fn lcd_route_broadcasts_to_first_lcd_endpoint() {
        let mut profile = profile();
        profile.broadcast = BroadcastRoute::Lcd;
        let client = ChainClient::new(
            profile,
            Arc::new(ScriptedTransport::new()),
            ReadCache::in_memory(1),
            Settings::default(),
        );

        let endpoint = client.broadcast_endpoint().await.unwrap();

        assert_eq!(endpoint.url, "http://lcd-a.test");
    }
}
