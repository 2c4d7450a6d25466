//! In-crate fakes shared by the unit tests.

use crate::lifecycle::{LifecycleDeps, OrchestratorConfig, PositionLifecycleOrchestrator};
use async_trait::async_trait;
use chrono::Utc;
use lpbot_data::cache::{LocalCache, TieredCache, TieredCacheConfig};
use lpbot_data::keys;
use lpbot_data::lock::{InMemoryLockBackend, LockConfig};
use lpbot_data::repositories::InMemoryStore;
use lpbot_domain::entities::{FetchedPoolState, LiquidityPool, PoolId, Token, User, UserId, Wallet};
use lpbot_domain::enums::{Chain, Dex, Network, TokenKind};
use lpbot_protocols::dex::{
    ClosePositionParams, ClosedPosition, DexAdapter, DexContext, DexError, DexRegistry, FetchedPool,
    OpenPositionParams, OpenedPosition, PoolFetchContext, SwapParams, SwapResult,
};
use lpbot_protocols::retry::RetryPolicy;
use lpbot_protocols::rpc::{BalancerConfig, EndpointGroups, JsonRpcClient, RpcEndpointBalancer};
use lpbot_protocols::signer::{PreparedAction, Signer, SignerError, SubmittedTx, ensure_same_chain};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeSigner {
    submitted: AtomicU32,
}

#[async_trait]
impl Signer for FakeSigner {
    async fn sign_and_submit(
        &self,
        wallet: &Wallet,
        action: PreparedAction,
    ) -> Result<SubmittedTx, SignerError> {
        ensure_same_chain(wallet, &action)?;
        let n = self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(SubmittedTx {
            tx_hash: format!("{}-{n}", action.label),
        })
    }
}

/// Scripted exchange. Every call is recorded by name.
pub struct FakeDex {
    pub calls: Mutex<Vec<&'static str>>,
    /// Number of upcoming `open_position` calls that fail with a transient error.
    pub open_failures: AtomicU32,
    /// When set, `open_position` is rejected with this reason.
    pub open_rejection: Mutex<Option<String>>,
    pub fetched: Mutex<Vec<FetchedPool>>,
    pub close_amounts: Mutex<(Decimal, Decimal)>,
    pub swap_rate: Decimal,
}

impl Default for FakeDex {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            open_failures: AtomicU32::new(0),
            open_rejection: Mutex::new(None),
            fetched: Mutex::new(Vec::new()),
            close_amounts: Mutex::new((Decimal::ZERO, Decimal::ZERO)),
            swap_rate: Decimal::ONE,
        }
    }
}

impl FakeDex {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    async fn submit(ctx: &DexContext, chain: Chain, label: &str) -> Result<String, DexError> {
        let action = PreparedAction {
            chain,
            label: label.to_string(),
            payload: Vec::new(),
        };
        Ok(ctx.signer.sign_and_submit(&ctx.wallet, action).await?.tx_hash)
    }
}

#[async_trait]
impl DexAdapter for FakeDex {
    fn dex(&self) -> Dex {
        Dex::OrcaWhirlpools
    }

    async fn fetch_pools(&self, _ctx: &PoolFetchContext) -> Result<Vec<FetchedPool>, DexError> {
        self.record("fetch_pools");
        Ok(self.fetched.lock().unwrap().clone())
    }

    async fn open_position(
        &self,
        ctx: &DexContext,
        params: &OpenPositionParams,
    ) -> Result<OpenedPosition, DexError> {
        self.record("open_position");
        if let Some(reason) = self.open_rejection.lock().unwrap().clone() {
            return Err(DexError::Rejected(reason));
        }
        let remaining = self.open_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.open_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DexError::Rpc("429 too many requests".to_string()));
        }
        Ok(OpenedPosition {
            tx_hash: Self::submit(ctx, params.pool.chain, "open").await?,
            liquidity: 1_000_000,
            deposit_amount: params.amount,
        })
    }

    async fn close_position(
        &self,
        ctx: &DexContext,
        params: &ClosePositionParams,
    ) -> Result<ClosedPosition, DexError> {
        self.record("close_position");
        let (amount_a, amount_b) = *self.close_amounts.lock().unwrap();
        Ok(ClosedPosition {
            tx_hash: Self::submit(ctx, params.pool.chain, "close").await?,
            amount_a,
            amount_b,
        })
    }

    async fn swap(&self, ctx: &DexContext, params: &SwapParams) -> Result<SwapResult, DexError> {
        self.record("swap");
        Ok(SwapResult {
            tx_hash: Some(Self::submit(ctx, params.pool.chain, "swap").await?),
            amount_out: params.amount_in * self.swap_rate,
        })
    }
}

/// SOL / jitoSOL pool; equal decimals keep tick prices near 1.0001^tick.
pub fn pool() -> LiquidityPool {
    LiquidityPool {
        id: PoolId(Uuid::new_v4()),
        dex: Dex::OrcaWhirlpools,
        chain: Chain::Solana,
        network: Network::Mainnet,
        address: "whirlpool".to_string(),
        token_a: Token::new("sol", "So111", "SOL", 9, TokenKind::Native),
        token_b: Token::new("jitosol", "J1to", "JitoSOL", 9, TokenKind::Volatile),
        fee_rate: dec!(0.003),
        tick_spacing: 64,
    }
}

pub fn user(kind: TokenKind) -> User {
    User {
        id: UserId(Uuid::new_v4()),
        farm_token_kind: kind,
        wallets: vec![Wallet {
            chain: Chain::Solana,
            address: "wallet".to_string(),
            key_handle: "kms://test".to_string(),
        }],
        assigned_pool_id: None,
    }
}

pub fn state(pool: &LiquidityPool, current_tick: i32) -> FetchedPoolState {
    FetchedPoolState {
        pool_id: pool.id,
        current_tick,
        current_sqrt_price: 1 << 64,
        fetched_at: Utc::now(),
        ttl_secs: 30,
    }
}

pub fn cache() -> TieredCache {
    TieredCache::new(
        Arc::new(LocalCache::new()),
        Arc::new(LocalCache::new()),
        TieredCacheConfig::default(),
    )
}

pub fn empty_rpc() -> Arc<RpcEndpointBalancer<JsonRpcClient>> {
    Arc::new(RpcEndpointBalancer::new(
        &EndpointGroups::new(),
        BalancerConfig::default(),
        |_url: &str| -> JsonRpcClient { unreachable!("no endpoints configured") },
    ))
}

pub fn fast_locks() -> LockConfig {
    LockConfig {
        lease_ttl: Duration::from_secs(5),
        acquire_timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(2),
    }
}

/// A fully wired orchestrator over in-memory collaborators.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub cache: TieredCache,
    pub dex: Arc<FakeDex>,
    pub locks: Arc<InMemoryLockBackend>,
    pub orchestrator: Arc<PositionLifecycleOrchestrator>,
    pub pool: LiquidityPool,
    pub user: User,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = cache();
        let dex = Arc::new(FakeDex::default());
        let locks = Arc::new(InMemoryLockBackend::new());
        let pool = pool();
        let user = user(TokenKind::Native);
        store.insert_pool(pool.clone()).await;
        store.insert_user(user.clone()).await;

        let deps = LifecycleDeps {
            cache: cache.clone(),
            pools: store.clone(),
            users: store.clone(),
            positions: store.clone(),
            registry: DexRegistry::new().with(dex.clone()),
            signer: Arc::new(FakeSigner::default()),
            rpc: empty_rpc(),
            locks: locks.clone(),
        };
        let config = OrchestratorConfig {
            adapter_retry: RetryPolicy::fixed(2, Duration::from_millis(1)),
            lock: fast_locks(),
            ..OrchestratorConfig::default()
        };

        Self {
            store,
            cache,
            dex,
            locks,
            orchestrator: Arc::new(PositionLifecycleOrchestrator::new(deps, config)),
            pool,
            user,
        }
    }

    pub async fn cache_state(&self, current_tick: i32) {
        let key = keys::pool_state(self.pool.chain, self.pool.network, &self.pool.id);
        self.cache
            .set(&key, &state(&self.pool, current_tick), Duration::from_secs(30))
            .await;
    }

    pub async fn cache_prices(&self, price_a: Option<Decimal>, price_b: Option<Decimal>) {
        for (token, price) in [(&self.pool.token_a.id, price_a), (&self.pool.token_b.id, price_b)] {
            let key = keys::token_price(self.pool.chain, self.pool.network, token);
            match price {
                Some(price) => self.cache.set(&key, &price, Duration::from_secs(60)).await,
                None => self.cache.delete(&key).await,
            }
        }
    }
}
