//! Serialized per-user state read by the exit engine.

use crate::error::LpError;
use chrono::{DateTime, Utc};
use lpbot_data::cache::TieredCache;
use lpbot_data::keys;
use lpbot_data::repositories::{PoolStore, PositionStore, UserStore};
use lpbot_domain::entities::{LiquidityPool, Position, TokenId, UserId};
use lpbot_domain::enums::{Chain, Network, TokenKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// An active position together with its pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub position: Position,
    pub pool: LiquidityPool,
}

/// Everything the exit engine needs about one user, cached at `user-state:{user}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub farm_token_kind: TokenKind,
    pub positions: Vec<PositionView>,
    pub built_at: DateTime<Utc>,
}

impl UserSnapshot {
    /// Active positions on `chain`/`network` whose pool trades `token`.
    pub fn positions_for_token<'a>(
        &'a self,
        chain: Chain,
        network: Network,
        token: &'a TokenId,
    ) -> impl Iterator<Item = &'a PositionView> + 'a {
        self.positions.iter().filter(move |view| {
            view.position.is_active
                && view.pool.chain == chain
                && view.pool.network == network
                && view.pool.references_token(token)
        })
    }
}

/// Rebuilds user snapshots from the durable store and writes them to the cache.
#[derive(Clone)]
pub struct SnapshotBuilder {
    cache: TieredCache,
    users: Arc<dyn UserStore>,
    pools: Arc<dyn PoolStore>,
    positions: Arc<dyn PositionStore>,
    ttl: Duration,
}

impl SnapshotBuilder {
    pub fn new(
        cache: TieredCache,
        users: Arc<dyn UserStore>,
        pools: Arc<dyn PoolStore>,
        positions: Arc<dyn PositionStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            users,
            pools,
            positions,
            ttl,
        }
    }

    pub async fn build(&self, user_id: &UserId) -> Result<UserSnapshot, LpError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(LpError::UserNotFound(*user_id))?;

        let mut views = Vec::new();
        for position in self.positions.active_positions(user_id).await? {
            let pool = self
                .pools
                .find_pool(&position.pool_id)
                .await?
                .ok_or(LpError::PoolNotFound(position.pool_id))?;
            views.push(PositionView { position, pool });
        }

        Ok(UserSnapshot {
            user_id: user.id,
            farm_token_kind: user.farm_token_kind,
            positions: views,
            built_at: Utc::now(),
        })
    }

    /// Rebuilds and caches the snapshot. On failure the stale entry is dropped
    /// so readers fall back to a miss instead of outdated positions.
    pub async fn refresh(&self, user_id: &UserId) -> Result<UserSnapshot, LpError> {
        let key = keys::user_snapshot(user_id);
        match self.build(user_id).await {
            Ok(snapshot) => {
                self.cache.set(&key, &snapshot, self.ttl).await;
                debug!(
                    user = %user_id,
                    positions = snapshot.positions.len(),
                    "User snapshot refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(user = %user_id, error = %e, "Snapshot rebuild failed, invalidating");
                self.cache.delete(&key).await;
                Err(e)
            }
        }
    }
}
