//! Durable store for pools, users and positions.
//!
//! The traits are what the engine depends on; [`Database`] provides the
//! PostgreSQL implementation and [`InMemoryStore`] a process-local one.

mod memory;
mod pool_repository;
mod position_repository;
mod user_repository;

pub use memory::InMemoryStore;
pub use pool_repository::{PoolRecord, PoolRepository};
pub use position_repository::{PositionRecord, PositionRepository};
pub use user_repository::{UserRecord, UserRepository, WalletRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lpbot_domain::DomainError;
use lpbot_domain::entities::{LiquidityPool, PoolId, Position, PositionId, TickRange, User, UserId};
use lpbot_domain::enums::{Chain, Network};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("position {0} is already closed")]
    AlreadyClosed(PositionId),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<DomainError> for StoreError {
    fn from(e: DomainError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Result of a successful on-chain open, to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosition {
    pub pool_id: PoolId,
    pub range: TickRange,
    pub liquidity: u128,
    pub deposit_amount: Decimal,
    pub priority_a_over_b: bool,
    pub open_tx_hash: String,
}

/// Outcome of a successful on-chain close, to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionClose {
    pub close_tx_hash: String,
    pub pnl: Decimal,
    pub roi: Decimal,
    pub closed_at: DateTime<Utc>,
}

#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn find_pool(&self, id: &PoolId) -> Result<Option<LiquidityPool>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Users holding at least one active position on `chain`/`network`.
    async fn active_user_ids(
        &self,
        chain: Chain,
        network: Network,
    ) -> Result<Vec<UserId>, StoreError>;
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn active_position(
        &self,
        user: &UserId,
        pool: &PoolId,
    ) -> Result<Option<Position>, StoreError>;

    async fn active_positions(&self, user: &UserId) -> Result<Vec<Position>, StoreError>;

    /// Inserts the position and points the user at its pool, atomically.
    async fn record_open(
        &self,
        user: &UserId,
        position: NewPosition,
    ) -> Result<Position, StoreError>;

    /// Closes an active position and clears the user's pool pointer, atomically.
    ///
    /// # Errors
    /// [`StoreError::AlreadyClosed`] if the position is not active.
    async fn record_close(
        &self,
        user: &UserId,
        position: &PositionId,
        close: PositionClose,
    ) -> Result<Position, StoreError>;
}

/// Database connection wrapper for repositories.
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Creates a new Database wrapper from a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connects to PostgreSQL.
    ///
    /// # Errors
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn pools(&self) -> PoolRepository {
        PoolRepository::new(self.pool.clone())
    }

    #[must_use]
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    #[must_use]
    pub fn positions(&self) -> PositionRepository {
        PositionRepository::new(self.pool.clone())
    }

    /// Runs database migrations.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(include_str!("../../migrations/001_initial_schema.sql"))
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}

pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Corrupt(format!("{column}: {e}")))
}
