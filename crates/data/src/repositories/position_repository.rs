//! Position persistence. Positions are inserted once, closed once, never deleted.

use super::{NewPosition, PositionClose, PositionStore, StoreError, parse_column};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lpbot_domain::entities::{PoolId, Position, PositionId, TickRange, UserId};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

/// Database record for a position.
#[derive(Debug, Clone)]
pub struct PositionRecord {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Decimal string of a u128.
    pub liquidity: String,
    pub deposit_amount: Decimal,
    pub priority_a_over_b: bool,
    pub open_tx_hash: String,
    pub close_tx_hash: Option<String>,
    pub roi: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub is_active: bool,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PositionRecord {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            pool_id: row.try_get("pool_id")?,
            user_id: row.try_get("user_id")?,
            tick_lower: row.try_get("tick_lower")?,
            tick_upper: row.try_get("tick_upper")?,
            liquidity: row.try_get("liquidity")?,
            deposit_amount: row.try_get("deposit_amount")?,
            priority_a_over_b: row.try_get("priority_a_over_b")?,
            open_tx_hash: row.try_get("open_tx_hash")?,
            close_tx_hash: row.try_get("close_tx_hash")?,
            roi: row.try_get("roi")?,
            pnl: row.try_get("pnl")?,
            is_active: row.try_get("is_active")?,
            opened_at: row.try_get("opened_at")?,
            closed_at: row.try_get("closed_at")?,
        })
    }

    /// # Errors
    /// [`StoreError::Corrupt`] for an inverted tick range or unparsable liquidity.
    pub fn into_position(self) -> Result<Position, StoreError> {
        Ok(Position {
            id: PositionId(self.id),
            pool_id: PoolId(self.pool_id),
            user_id: UserId(self.user_id),
            range: TickRange::new(self.tick_lower, self.tick_upper)?,
            liquidity: parse_column("liquidity", &self.liquidity)?,
            deposit_amount: self.deposit_amount,
            priority_a_over_b: self.priority_a_over_b,
            open_tx_hash: self.open_tx_hash,
            close_tx_hash: self.close_tx_hash,
            roi: self.roi,
            pnl: self.pnl,
            is_active: self.is_active,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
        })
    }
}

fn decode(row: &PgRow) -> Result<Position, StoreError> {
    PositionRecord::from_row(row)?.into_position()
}

/// Repository for positions.
#[derive(Clone)]
pub struct PositionRepository {
    pool: Arc<PgPool>,
}

impl PositionRepository {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PositionRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM positions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.as_ref().map(PositionRecord::from_row).transpose()
    }
}

#[async_trait]
impl PositionStore for PositionRepository {
    async fn active_position(
        &self,
        user: &UserId,
        pool: &PoolId,
    ) -> Result<Option<Position>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM positions WHERE user_id = $1 AND pool_id = $2 AND is_active",
        )
        .bind(user.0)
        .bind(pool.0)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.as_ref().map(decode).transpose()
    }

    async fn active_positions(&self, user: &UserId) -> Result<Vec<Position>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM positions WHERE user_id = $1 AND is_active ORDER BY opened_at",
        )
        .bind(user.0)
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter().map(decode).collect()
    }

    async fn record_open(
        &self,
        user: &UserId,
        position: NewPosition,
    ) -> Result<Position, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO positions (id, pool_id, user_id, tick_lower, tick_upper, liquidity,
                                   deposit_amount, priority_a_over_b, open_tx_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(position.pool_id.0)
        .bind(user.0)
        .bind(position.range.lower())
        .bind(position.range.upper())
        .bind(position.liquidity.to_string())
        .bind(position.deposit_amount)
        .bind(position.priority_a_over_b)
        .bind(&position.open_tx_hash)
        .fetch_one(&mut *tx)
        .await?;

        let updated =
            sqlx::query("UPDATE users SET assigned_pool_id = $1, updated_at = NOW() WHERE id = $2")
                .bind(position.pool_id.0)
                .bind(user.0)
                .execute(&mut *tx)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {user}")));
        }

        let stored = decode(&row)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn record_close(
        &self,
        user: &UserId,
        position: &PositionId,
        close: PositionClose,
    ) -> Result<Position, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE positions
            SET is_active = FALSE, close_tx_hash = $1, pnl = $2, roi = $3, closed_at = $4
            WHERE id = $5 AND user_id = $6 AND is_active
            RETURNING *
            "#,
        )
        .bind(&close.close_tx_hash)
        .bind(close.pnl)
        .bind(close.roi)
        .bind(close.closed_at)
        .bind(position.0)
        .bind(user.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return match self.find_by_id(position.0).await? {
                Some(_) => Err(StoreError::AlreadyClosed(*position)),
                None => Err(StoreError::NotFound(format!("position {position}"))),
            };
        };

        let stored = decode(&row)?;
        // Leave the pointer alone if it already moved to another pool.
        sqlx::query(
            r#"
            UPDATE users SET assigned_pool_id = NULL, updated_at = NOW()
            WHERE id = $1 AND assigned_pool_id = $2
            "#,
        )
        .bind(user.0)
        .bind(stored.pool_id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }
}
