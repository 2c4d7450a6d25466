use crate::bus::{EventBus, LpEvent};
use crate::error::LpError;
use crate::settle::{log_failures, settle_all};
use lpbot_data::cache::TieredCache;
use lpbot_data::keys;
use lpbot_domain::eligibility::can_open_position;
use lpbot_domain::entities::{FetchedPoolState, PoolId};
use lpbot_domain::enums::{Chain, Dex, Network};
use lpbot_protocols::dex::{DexAdapter, DexRegistry, FetchedPool, PoolFetchContext};
use lpbot_protocols::retry::{RetryPolicy, retry};
use lpbot_protocols::rpc::{EndpointGroups, JsonRpcClient, RpcEndpointBalancer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Cache lifetime of a fetched pool state.
    pub state_ttl: Duration,
    pub fetch_retry: RetryPolicy,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            state_ttl: Duration::from_secs(30),
            fetch_retry: RetryPolicy::fixed(2, Duration::from_millis(500)),
        }
    }
}

/// Open eligibility of one pool for each priority side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolEligibility {
    pub pool_id: PoolId,
    pub current_tick: i32,
    pub can_open_a: bool,
    pub can_open_b: bool,
}

impl PoolEligibility {
    pub fn any(&self) -> bool {
        self.can_open_a || self.can_open_b
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexRefresh {
    pub dex: Dex,
    pub pools: Vec<PoolEligibility>,
}

/// Fetches live pool state from every adapter of a chain and caches it.
pub struct PoolStateRefresher {
    registry: DexRegistry,
    cache: TieredCache,
    bus: Arc<EventBus>,
    rpc: Arc<RpcEndpointBalancer<JsonRpcClient>>,
    config: RefresherConfig,
}

impl PoolStateRefresher {
    pub fn new(
        registry: DexRegistry,
        cache: TieredCache,
        bus: Arc<EventBus>,
        rpc: Arc<RpcEndpointBalancer<JsonRpcClient>>,
        config: RefresherConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            bus,
            rpc,
            config,
        }
    }

    /// Refreshes every exchange on `chain`. A failing adapter is logged and
    /// left out of the result; the others are unaffected.
    pub async fn refresh(&self, chain: Chain, network: Network) -> Vec<DexRefresh> {
        let ctx = PoolFetchContext {
            network,
            rpc: self.rpc.clone(),
            rpc_group: EndpointGroups::group_name(chain, network),
        };

        let adapters = self.registry.for_chain(chain);
        let branches = adapters.iter().map(|adapter| {
            let refresh = self.refresh_dex(adapter.as_ref(), &ctx, chain, network);
            (adapter.dex(), refresh)
        });
        let settled = settle_all(branches).await;
        log_failures("pool refresh", &settled);

        settled
            .into_iter()
            .filter_map(|branch| branch.outcome.ok())
            .collect()
    }

    async fn refresh_dex(
        &self,
        adapter: &dyn DexAdapter,
        ctx: &PoolFetchContext,
        chain: Chain,
        network: Network,
    ) -> Result<DexRefresh, LpError> {
        let dex = adapter.dex();
        let fetched: Vec<FetchedPool> = retry(&self.config.fetch_retry, || adapter.fetch_pools(ctx))
            .await?
            .into_iter()
            .filter(|f| f.pool.chain == chain && f.pool.network == network)
            .collect();

        let entries: Vec<(String, FetchedPoolState)> = fetched
            .iter()
            .map(|f| (keys::pool_state(chain, network, &f.pool.id), f.state.clone()))
            .collect();
        self.cache.mset(&entries, self.config.state_ttl).await;

        let mut pools = Vec::with_capacity(fetched.len());
        for FetchedPool { pool, state } in &fetched {
            let eligibility = can_open_position(pool, state, true)
                .and_then(|a| Ok((a, can_open_position(pool, state, false)?)));
            match eligibility {
                Ok((can_open_a, can_open_b)) => pools.push(PoolEligibility {
                    pool_id: pool.id,
                    current_tick: state.current_tick,
                    can_open_a,
                    can_open_b,
                }),
                Err(e) => warn!(pool = %pool.id, error = %e, "Skipping pool with invalid geometry"),
            }
        }

        let eligible = pools.iter().filter(|p| p.any()).count();
        info!(
            dex = %dex,
            chain = %chain,
            network = %network,
            pools = fetched.len(),
            eligible,
            "Pool states refreshed"
        );
        self.bus.publish(LpEvent::PoolsFetched {
            chain,
            network,
            dex,
            count: fetched.len(),
            eligible,
        });

        Ok(DexRefresh { dex, pools })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::POOLS_FETCHED;
    use crate::testing::{self, FakeDex};
    use async_trait::async_trait;
    use lpbot_protocols::dex::{
        ClosePositionParams, ClosedPosition, DexContext, DexError, OpenPositionParams,
        OpenedPosition, SwapParams, SwapResult,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixture {
        dex: Arc<FakeDex>,
        cache: TieredCache,
        bus: Arc<EventBus>,
        refresher: PoolStateRefresher,
    }

    fn fixture() -> Fixture {
        let dex = Arc::new(FakeDex::default());
        let cache = testing::cache();
        let bus = Arc::new(EventBus::default());
        let refresher = PoolStateRefresher::new(
            DexRegistry::new().with(dex.clone()),
            cache.clone(),
            bus.clone(),
            testing::empty_rpc(),
            RefresherConfig::default(),
        );
        Fixture {
            dex,
            cache,
            bus,
            refresher,
        }
    }

    #[tokio::test]
    async fn test_refresh_caches_state_and_reports_eligibility() {
        let fx = fixture();
        let centered = testing::pool();
        let edge = testing::pool();
        *fx.dex.fetched.lock().unwrap() = vec![
            FetchedPool {
                state: testing::state(&centered, 21),
                pool: centered.clone(),
            },
            FetchedPool {
                state: testing::state(&edge, 63),
                pool: edge.clone(),
            },
        ];
        let mut events = fx.bus.receiver(POOLS_FETCHED);

        let refreshed = fx.refresher.refresh(Chain::Solana, Network::Mainnet).await;

        assert_eq!(refreshed.len(), 1);
        let pools = &refreshed[0].pools;
        assert_eq!(
            pools[0],
            PoolEligibility {
                pool_id: centered.id,
                current_tick: 21,
                can_open_a: true,
                can_open_b: false,
            }
        );
        assert!(!pools[1].can_open_a && pools[1].can_open_b);

        let key = keys::pool_state(Chain::Solana, Network::Mainnet, &edge.id);
        let cached: FetchedPoolState = fx.cache.get(&key).await.unwrap();
        assert_eq!(cached.current_tick, 63);

        match events.recv().await.unwrap() {
            LpEvent::PoolsFetched { count, eligible, .. } => {
                assert_eq!(count, 2);
                assert_eq!(eligible, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_chain_adapters_are_not_called() {
        let fx = fixture();
        let refreshed = fx.refresher.refresh(Chain::Sui, Network::Mainnet).await;
        assert!(refreshed.is_empty());
        assert!(fx.dex.calls().is_empty());
    }

    struct BrokenDex {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl DexAdapter for BrokenDex {
        fn dex(&self) -> Dex {
            Dex::Raydium
        }

        async fn fetch_pools(&self, _ctx: &PoolFetchContext) -> Result<Vec<FetchedPool>, DexError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DexError::Rpc("timeout".to_string()))
        }

        async fn open_position(
            &self,
            _ctx: &DexContext,
            _params: &OpenPositionParams,
        ) -> Result<OpenedPosition, DexError> {
            Err(DexError::Rejected("read-only".to_string()))
        }

        async fn close_position(
            &self,
            _ctx: &DexContext,
            _params: &ClosePositionParams,
        ) -> Result<ClosedPosition, DexError> {
            Err(DexError::Rejected("read-only".to_string()))
        }

        async fn swap(
            &self,
            _ctx: &DexContext,
            _params: &SwapParams,
        ) -> Result<SwapResult, DexError> {
            Err(DexError::Rejected("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failing_adapter_does_not_block_others() {
        let dex = Arc::new(FakeDex::default());
        let pool = testing::pool();
        *dex.fetched.lock().unwrap() = vec![FetchedPool {
            state: testing::state(&pool, 10),
            pool,
        }];
        let broken = Arc::new(BrokenDex {
            attempts: AtomicU32::new(0),
        });
        let refresher = PoolStateRefresher::new(
            DexRegistry::new().with(dex.clone()).with(broken.clone()),
            testing::cache(),
            Arc::new(EventBus::default()),
            testing::empty_rpc(),
            RefresherConfig {
                fetch_retry: RetryPolicy::fixed(1, Duration::from_millis(1)),
                ..RefresherConfig::default()
            },
        );

        let refreshed = refresher.refresh(Chain::Solana, Network::Mainnet).await;

        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].dex, Dex::OrcaWhirlpools);
        assert_eq!(broken.attempts.load(Ordering::SeqCst), 2);
    }
}
