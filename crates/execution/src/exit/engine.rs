//! Price-driven exit ladder, serialized per token.

use crate::bus::{EventHandler, LpEvent};
use crate::error::LpError;
use crate::lifecycle::{PositionView, UserSnapshot};
use async_trait::async_trait;
use futures::future::join_all;
use lpbot_data::cache::TieredCache;
use lpbot_data::keys;
use lpbot_data::lock::{LockBackend, LockConfig, LockCoordinator};
use lpbot_data::repositories::UserStore;
use lpbot_domain::entities::{LiquidityPool, PositionId, TokenId, UserId};
use lpbot_domain::enums::{Chain, Network};
use lpbot_domain::exit::{ExitBand, ExitDecision, ExitThresholds};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Closes a position the exit engine decided to leave.
#[async_trait]
pub trait PositionCloser: Send + Sync {
    async fn close_for_exit(&self, pool: &LiquidityPool, user: &UserId) -> Result<(), LpError>;
}

#[derive(Debug, Clone)]
pub struct ExitConfig {
    /// Lease for the per-token exit lock; must cover closing every affected position.
    pub lock: LockConfig,
    pub thresholds: ExitThresholds,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig {
                lease_ttl: Duration::from_secs(300),
                ..LockConfig::default()
            },
            thresholds: ExitThresholds::default(),
        }
    }
}

/// What happened to one evaluated position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionVerdict {
    /// A token price was missing from the cache; nothing was decided.
    PriceMissing,
    /// The exit band could not be built for this position.
    Invalid(String),
    Decided(ExitDecision),
    /// An exit was decided but the close failed; retried on the next price update.
    CloseFailed {
        decision: ExitDecision,
        error: String,
    },
}

impl PositionVerdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Invalid(_) | Self::CloseFailed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionEvaluation {
    pub user_id: UserId,
    pub position_id: PositionId,
    pub verdict: PositionVerdict,
}

/// Summary of one price-update sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitSweep {
    pub active_users: usize,
    /// Active users without a cached snapshot.
    pub missing_snapshots: usize,
    pub evaluations: Vec<PositionEvaluation>,
    /// Users with at least one position that could not be evaluated or closed.
    pub failed_users: usize,
}

impl ExitSweep {
    pub fn closed(&self) -> impl Iterator<Item = &PositionEvaluation> {
        self.evaluations
            .iter()
            .filter(|e| matches!(e.verdict, PositionVerdict::Decided(d) if d.should_close()))
    }
}

/// Decides, on every token price update, which positions trading that token
/// should be closed, and closes them through a [`PositionCloser`].
///
/// Users are evaluated concurrently from their cached snapshots. A failure on
/// one position is recorded in its [`PositionVerdict`] and never stops the
/// user's other positions or other users.
pub struct ExitDecisionEngine {
    cache: TieredCache,
    users: Arc<dyn UserStore>,
    closer: Arc<dyn PositionCloser>,
    locks: LockCoordinator,
    config: ExitConfig,
}

impl ExitDecisionEngine {
    pub fn new(
        cache: TieredCache,
        users: Arc<dyn UserStore>,
        closer: Arc<dyn PositionCloser>,
        lock_backend: Arc<dyn LockBackend>,
        config: ExitConfig,
    ) -> Self {
        let locks = LockCoordinator::new(lock_backend, config.lock.clone());
        Self {
            cache,
            users,
            closer,
            locks,
            config,
        }
    }

    /// Evaluates every active position trading `token` on `chain`/`network`.
    ///
    /// Runs under the `exit-{chain}-{network}-{token}` lock so overlapping
    /// updates for one token never evaluate concurrently.
    pub async fn on_price_updated(
        &self,
        chain: Chain,
        network: Network,
        token: &TokenId,
    ) -> Result<ExitSweep, LpError> {
        let key = vec![keys::exit_lock(chain, network, token)];
        self.locks
            .with_locks(&key, &key, &key, || self.sweep(chain, network, token))
            .await
    }

    async fn sweep(
        &self,
        chain: Chain,
        network: Network,
        token: &TokenId,
    ) -> Result<ExitSweep, LpError> {
        let user_ids = self.users.active_user_ids(chain, network).await?;
        let snapshot_keys: Vec<String> = user_ids.iter().map(keys::user_snapshot).collect();
        let snapshots: Vec<Option<UserSnapshot>> = self.cache.mget(&snapshot_keys).await;

        let mut sweep = ExitSweep {
            active_users: user_ids.len(),
            ..ExitSweep::default()
        };

        let mut branches = Vec::new();
        for (user_id, snapshot) in user_ids.into_iter().zip(snapshots) {
            let Some(snapshot) = snapshot else {
                debug!(user = %user_id, "No cached snapshot, skipping user");
                sweep.missing_snapshots += 1;
                continue;
            };
            branches.push(self.evaluate_user(snapshot, chain, network, token));
        }

        sweep.evaluations = join_all(branches).await.into_iter().flatten().collect();
        sweep.failed_users = sweep
            .evaluations
            .iter()
            .filter(|e| e.verdict.is_failure())
            .map(|e| e.user_id)
            .collect::<HashSet<_>>()
            .len();

        debug!(
            chain = %chain,
            network = %network,
            token = %token,
            users = sweep.active_users,
            positions = sweep.evaluations.len(),
            failed = sweep.failed_users,
            "Exit sweep finished"
        );
        Ok(sweep)
    }

    async fn evaluate_user(
        &self,
        snapshot: UserSnapshot,
        chain: Chain,
        network: Network,
        token: &TokenId,
    ) -> Vec<PositionEvaluation> {
        let user = snapshot.user_id;
        let mut evaluations = Vec::new();
        for view in snapshot.positions_for_token(chain, network, token) {
            let verdict = self.evaluate_position(&user, view).await;
            evaluations.push(PositionEvaluation {
                user_id: user,
                position_id: view.position.id,
                verdict,
            });
        }
        evaluations
    }

    async fn evaluate_position(&self, user: &UserId, view: &PositionView) -> PositionVerdict {
        let Some(oracle) = self.oracle_price(&view.pool).await else {
            debug!(user = %user, pool = %view.pool.id, "Token price missing, skipping");
            return PositionVerdict::PriceMissing;
        };
        let decision = match self.decide(view, oracle) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(user = %user, position = %view.position.id, error = %e, "Exit band rejected");
                return PositionVerdict::Invalid(e.to_string());
            }
        };
        match self.act(user, view, decision).await {
            Ok(()) => PositionVerdict::Decided(decision),
            Err(e) => {
                warn!(
                    user = %user,
                    position = %view.position.id,
                    decision = ?decision,
                    error = %e,
                    "Exit close failed"
                );
                PositionVerdict::CloseFailed {
                    decision,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Price of token A in token B, or `None` if either price is not cached.
    async fn oracle_price(&self, pool: &LiquidityPool) -> Option<Decimal> {
        let price_keys = [
            keys::token_price(pool.chain, pool.network, &pool.token_a.id),
            keys::token_price(pool.chain, pool.network, &pool.token_b.id),
        ];
        let prices: Vec<Option<Decimal>> = self.cache.mget(&price_keys).await;
        match prices.as_slice() {
            [Some(a), Some(b)] if *b > Decimal::ZERO => Some(*a / *b),
            _ => None,
        }
    }

    fn decide(&self, view: &PositionView, oracle: Decimal) -> Result<ExitDecision, LpError> {
        let band = ExitBand::from_ticks(
            view.position.range,
            view.pool.token_a.decimals,
            view.pool.token_b.decimals,
            view.pool.fee_rate,
            self.config.thresholds,
        )?;
        Ok(band.decide(oracle, view.position.priority_a_over_b))
    }

    async fn act(
        &self,
        user: &UserId,
        view: &PositionView,
        decision: ExitDecision,
    ) -> Result<(), LpError> {
        match decision {
            ExitDecision::Hold => Ok(()),
            ExitDecision::OutOfRange => {
                info!(user = %user, position = %view.position.id, "out of range, not yet exiting");
                Ok(())
            }
            ExitDecision::HardExit | ExitDecision::SoftExit => {
                info!(
                    user = %user,
                    position = %view.position.id,
                    decision = ?decision,
                    "Exit triggered, closing position"
                );
                self.closer.close_for_exit(&view.pool, user).await
            }
        }
    }
}

#[async_trait]
impl EventHandler for ExitDecisionEngine {
    async fn handle(&self, event: LpEvent) {
        let LpEvent::PriceUpdated {
            chain,
            network,
            token_id,
        } = event
        else {
            return;
        };
        if let Err(e) = self.on_price_updated(chain, network, &token_id).await {
            warn!(
                chain = %chain,
                network = %network,
                token = %token_id,
                error = %e,
                "Exit evaluation failed"
            );
        }
    }
}
