//! End-to-end open and close of LP positions.

use super::SnapshotBuilder;
use crate::error::LpError;
use crate::exit::PositionCloser;
use async_trait::async_trait;
use chrono::Utc;
use lpbot_data::cache::TieredCache;
use lpbot_data::keys;
use lpbot_data::lock::{LockBackend, LockConfig, LockCoordinator};
use lpbot_data::repositories::{NewPosition, PoolStore, PositionClose, PositionStore, UserStore};
use lpbot_domain::eligibility::ActiveBin;
use lpbot_domain::entities::position::roi;
use lpbot_domain::entities::{
    FetchedPoolState, LiquidityPool, PoolId, PositionId, User, UserId, Wallet,
};
use lpbot_domain::enums::Network;
use lpbot_protocols::dex::{
    ClosePositionParams, DexContext, DexError, DexRegistry, OpenPositionParams, SwapParams,
    SwapResult,
};
use lpbot_protocols::retry::{RetryPolicy, retry_if};
use lpbot_protocols::rpc::{EndpointGroups, JsonRpcClient, RpcEndpointBalancer};
use lpbot_protocols::signer::Signer;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Configuration for [`PositionLifecycleOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retry policy around each adapter call.
    pub adapter_retry: RetryPolicy,
    /// Lifetime of the cached user snapshot.
    pub snapshot_ttl: Duration,
    /// Cached pool state older than this is treated as absent.
    pub pool_state_max_age: Duration,
    /// Lease settings for the per-user lock.
    pub lock: LockConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            adapter_retry: RetryPolicy::fixed(3, Duration::from_secs(1)),
            snapshot_ttl: Duration::from_secs(600),
            pool_state_max_age: Duration::from_secs(60),
            lock: LockConfig {
                lease_ttl: Duration::from_secs(180),
                ..LockConfig::default()
            },
        }
    }
}

/// Collaborators the orchestrator acts through.
#[derive(Clone)]
pub struct LifecycleDeps {
    pub cache: TieredCache,
    pub pools: Arc<dyn PoolStore>,
    pub users: Arc<dyn UserStore>,
    pub positions: Arc<dyn PositionStore>,
    pub registry: DexRegistry,
    pub signer: Arc<dyn Signer>,
    pub rpc: Arc<RpcEndpointBalancer<JsonRpcClient>>,
    pub locks: Arc<dyn LockBackend>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionRequest {
    pub pool_id: PoolId,
    pub user_id: UserId,
    /// Amount of the farm token to deposit.
    pub amount: Decimal,
    pub network: Network,
    /// Overrides the side derived from the user's farm token.
    pub priority_a_over_b: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionOutcome {
    pub position_id: PositionId,
    pub tx_hash: String,
    pub liquidity: u128,
    pub deposit_amount: Decimal,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosePositionOutcome {
    /// Total received in the retained token after the proceeds swap.
    pub received_amount_out: Decimal,
    pub profit_amount: Decimal,
    pub close_position_tx_hash: String,
    /// `None` when there was nothing to swap.
    pub flexible_swap_tx_hash: Option<String>,
}

/// Opens and closes positions for users.
///
/// Every operation runs under the user's `position-{chain}-{network}-{user}`
/// lock, calls the DEX adapter with retries on transient failures, records the
/// result in the position store, and rebuilds the user's cached snapshot.
pub struct PositionLifecycleOrchestrator {
    deps: LifecycleDeps,
    locks: LockCoordinator,
    snapshots: SnapshotBuilder,
    config: OrchestratorConfig,
}

impl PositionLifecycleOrchestrator {
    pub fn new(deps: LifecycleDeps, config: OrchestratorConfig) -> Self {
        let locks = LockCoordinator::new(deps.locks.clone(), config.lock.clone());
        let snapshots = SnapshotBuilder::new(
            deps.cache.clone(),
            deps.users.clone(),
            deps.pools.clone(),
            deps.positions.clone(),
            config.snapshot_ttl,
        );
        Self {
            deps,
            locks,
            snapshots,
            config,
        }
    }

    pub fn snapshots(&self) -> &SnapshotBuilder {
        &self.snapshots
    }

    async fn load_pool(
        &self,
        pool_id: &PoolId,
        network: Network,
    ) -> Result<LiquidityPool, LpError> {
        let pool = self
            .deps
            .pools
            .find_pool(pool_id)
            .await?
            .ok_or(LpError::PoolNotFound(*pool_id))?;
        if pool.network != network {
            return Err(LpError::Validation(format!(
                "pool {} is on {}, not {network}",
                pool.id, pool.network
            )));
        }
        Ok(pool)
    }

    async fn load_user(&self, user_id: &UserId) -> Result<User, LpError> {
        self.deps
            .users
            .find_user(user_id)
            .await?
            .ok_or(LpError::UserNotFound(*user_id))
    }

    fn wallet(&self, user: &User, pool: &LiquidityPool) -> Result<Wallet, LpError> {
        user.wallet_for(pool.chain)
            .cloned()
            .ok_or(LpError::WalletNotFound {
                user: user.id,
                chain: pool.chain,
            })
    }

    /// Cached live state, only if still fresh.
    async fn fresh_state(&self, pool: &LiquidityPool) -> Result<FetchedPoolState, LpError> {
        let key = keys::pool_state(pool.chain, pool.network, &pool.id);
        let now = Utc::now();
        let max_age = chrono::Duration::from_std(self.config.pool_state_max_age)
            .unwrap_or(chrono::Duration::MAX);

        match self.deps.cache.get::<FetchedPoolState>(&key).await {
            Some(state) if state.is_fresh(now) && now - state.fetched_at <= max_age => Ok(state),
            Some(state) => {
                warn!(
                    pool = %pool.id,
                    fetched_at = %state.fetched_at,
                    "Cached pool state is stale"
                );
                Err(LpError::PoolStateNotFound(pool.id))
            }
            None => Err(LpError::PoolStateNotFound(pool.id)),
        }
    }

    fn dex_context(&self, wallet: Wallet, pool: &LiquidityPool) -> DexContext {
        DexContext {
            wallet,
            network: pool.network,
            signer: self.deps.signer.clone(),
            rpc: self.deps.rpc.clone(),
            rpc_group: EndpointGroups::group_name(pool.chain, pool.network),
        }
    }

    async fn refresh_snapshot(&self, user_id: &UserId) {
        if let Err(e) = self.snapshots.refresh(user_id).await {
            warn!(user = %user_id, error = %e, "Could not refresh user snapshot");
        }
    }

    /// Opens a position covering the pool's active bin.
    ///
    /// # Errors
    /// [`LpError::PoolStateNotFound`] without touching the adapter when no
    /// fresh pool state is cached; otherwise any lookup, adapter or store error.
    pub async fn open_position(
        &self,
        request: OpenPositionRequest,
    ) -> Result<OpenPositionOutcome, LpError> {
        let pool = self.load_pool(&request.pool_id, request.network).await?;
        let lock_key = vec![keys::position_lock(pool.chain, pool.network, &request.user_id)];

        self.locks
            .with_locks(&lock_key, &lock_key, &lock_key, || self.open_locked(&pool, &request))
            .await
    }

    async fn open_locked(
        &self,
        pool: &LiquidityPool,
        request: &OpenPositionRequest,
    ) -> Result<OpenPositionOutcome, LpError> {
        let state = self.fresh_state(pool).await?;
        let user = self.load_user(&request.user_id).await?;
        let wallet = self.wallet(&user, pool)?;

        if self
            .deps
            .positions
            .active_position(&user.id, &pool.id)
            .await?
            .is_some()
        {
            return Err(LpError::Validation(format!(
                "user {} already has an active position in pool {}",
                user.id, pool.id
            )));
        }

        let priority_a_over_b = match request.priority_a_over_b {
            Some(priority) => priority,
            None => pool.priority_a_over_b(user.farm_token_kind)?,
        };
        let range = ActiveBin::for_pool(pool, &state)?.tick_bounds();

        let adapter = self.deps.registry.get(pool.dex)?;
        let ctx = self.dex_context(wallet, pool);
        let params = OpenPositionParams {
            pool: pool.clone(),
            state,
            range,
            amount: request.amount,
            priority_a_over_b,
        };

        info!(
            user = %user.id,
            pool = %pool.id,
            dex = %pool.dex,
            tick_lower = range.lower(),
            tick_upper = range.upper(),
            amount = %request.amount,
            "Opening position"
        );
        let opened = retry_if(
            &self.config.adapter_retry,
            || adapter.open_position(&ctx, &params),
            DexError::is_transient,
        )
        .await?;

        let stored = self
            .deps
            .positions
            .record_open(
                &user.id,
                NewPosition {
                    pool_id: pool.id,
                    range,
                    liquidity: opened.liquidity,
                    deposit_amount: opened.deposit_amount,
                    priority_a_over_b,
                    open_tx_hash: opened.tx_hash.clone(),
                },
            )
            .await
            .inspect_err(|e| {
                error!(
                    user = %user.id,
                    tx_hash = %opened.tx_hash,
                    error = %e,
                    "Position opened on-chain but not recorded"
                );
            })?;

        info!(user = %user.id, position = %stored.id, tx_hash = %opened.tx_hash, "Position opened");
        self.refresh_snapshot(&user.id).await;

        Ok(OpenPositionOutcome {
            position_id: stored.id,
            tx_hash: opened.tx_hash,
            liquidity: opened.liquidity,
            deposit_amount: opened.deposit_amount,
            tick_lower: range.lower(),
            tick_upper: range.upper(),
        })
    }

    /// Closes the user's active position in the pool and swaps the proceeds
    /// into the retained token.
    pub async fn close_position(
        &self,
        pool_id: &PoolId,
        user_id: &UserId,
        network: Network,
    ) -> Result<ClosePositionOutcome, LpError> {
        let pool = self.load_pool(pool_id, network).await?;
        let lock_key = vec![keys::position_lock(pool.chain, pool.network, user_id)];

        self.locks
            .with_locks(&lock_key, &lock_key, &lock_key, || self.close_locked(&pool, user_id))
            .await
    }

    async fn close_locked(
        &self,
        pool: &LiquidityPool,
        user_id: &UserId,
    ) -> Result<ClosePositionOutcome, LpError> {
        let user = self.load_user(user_id).await?;
        let wallet = self.wallet(&user, pool)?;
        let position = self
            .deps
            .positions
            .active_position(&user.id, &pool.id)
            .await?
            .ok_or(LpError::PositionNotFound {
                user: user.id,
                pool: pool.id,
            })?;

        let adapter = self.deps.registry.get(pool.dex)?;
        let ctx = self.dex_context(wallet, pool);

        info!(user = %user.id, position = %position.id, pool = %pool.id, "Closing position");
        let close_params = ClosePositionParams {
            pool: pool.clone(),
            position: position.clone(),
        };
        let closed = retry_if(
            &self.config.adapter_retry,
            || adapter.close_position(&ctx, &close_params),
            DexError::is_transient,
        )
        .await?;

        // proceeds of the non-retained side are swapped into the retained one
        let (retained, to_swap) = if position.priority_a_over_b {
            (closed.amount_a, closed.amount_b)
        } else {
            (closed.amount_b, closed.amount_a)
        };
        let swapped = if to_swap > Decimal::ZERO {
            let swap_params = SwapParams {
                pool: pool.clone(),
                into_a: position.priority_a_over_b,
                amount_in: to_swap,
            };
            retry_if(
                &self.config.adapter_retry,
                || adapter.swap(&ctx, &swap_params),
                DexError::is_transient,
            )
            .await
                .inspect_err(|e| {
                    error!(
                        user = %user.id,
                        tx_hash = %closed.tx_hash,
                        error = %e,
                        "Position closed on-chain but proceeds swap failed"
                    );
                })?
        } else {
            SwapResult {
                tx_hash: None,
                amount_out: Decimal::ZERO,
            }
        };

        let received = retained + swapped.amount_out;
        let profit = received - position.deposit_amount;
        let close = PositionClose {
            close_tx_hash: closed.tx_hash.clone(),
            pnl: profit,
            roi: roi(profit, position.deposit_amount),
            closed_at: Utc::now(),
        };
        self.deps
            .positions
            .record_close(&user.id, &position.id, close)
            .await
            .inspect_err(|e| {
                error!(
                    user = %user.id,
                    tx_hash = %closed.tx_hash,
                    error = %e,
                    "Position closed on-chain but not recorded"
                );
            })?;

        info!(
            user = %user.id,
            position = %position.id,
            received = %received,
            profit = %profit,
            "Position closed"
        );
        self.refresh_snapshot(&user.id).await;

        Ok(ClosePositionOutcome {
            received_amount_out: received,
            profit_amount: profit,
            close_position_tx_hash: closed.tx_hash,
            flexible_swap_tx_hash: swapped.tx_hash,
        })
    }
}

#[async_trait]
impl PositionCloser for PositionLifecycleOrchestrator {
    async fn close_for_exit(&self, pool: &LiquidityPool, user: &UserId) -> Result<(), LpError> {
        self.close_position(&pool.id, user, pool.network).await.map(|_| ())
    }
}
