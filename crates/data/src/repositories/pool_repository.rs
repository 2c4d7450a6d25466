//! Liquidity pool persistence.

use super::{PoolStore, StoreError, parse_column};
use async_trait::async_trait;
use lpbot_domain::entities::{LiquidityPool, PoolId, Token, TokenId};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

/// Database record for a liquidity pool, with both tokens inlined.
#[derive(Debug, Clone)]
pub struct PoolRecord {
    pub id: Uuid,
    /// Exchange identifier (orca_whirlpools, cetus, ...).
    pub dex: String,
    pub chain: String,
    pub network: String,
    /// On-chain pool address.
    pub address: String,
    pub token_a_id: String,
    pub token_a_address: String,
    pub token_a_symbol: String,
    pub token_a_decimals: i16,
    pub token_a_kind: String,
    pub token_b_id: String,
    pub token_b_address: String,
    pub token_b_symbol: String,
    pub token_b_decimals: i16,
    pub token_b_kind: String,
    /// Fee as a fraction.
    pub fee_rate: Decimal,
    pub tick_spacing: i32,
}

impl PoolRecord {
    /// Creates a PoolRecord from a database row.
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            dex: row.try_get("dex")?,
            chain: row.try_get("chain")?,
            network: row.try_get("network")?,
            address: row.try_get("address")?,
            token_a_id: row.try_get("token_a_id")?,
            token_a_address: row.try_get("token_a_address")?,
            token_a_symbol: row.try_get("token_a_symbol")?,
            token_a_decimals: row.try_get("token_a_decimals")?,
            token_a_kind: row.try_get("token_a_kind")?,
            token_b_id: row.try_get("token_b_id")?,
            token_b_address: row.try_get("token_b_address")?,
            token_b_symbol: row.try_get("token_b_symbol")?,
            token_b_decimals: row.try_get("token_b_decimals")?,
            token_b_kind: row.try_get("token_b_kind")?,
            fee_rate: row.try_get("fee_rate")?,
            tick_spacing: row.try_get("tick_spacing")?,
        })
    }

    /// Converts the record into the domain entity.
    ///
    /// # Errors
    /// [`StoreError::Corrupt`] if an enum column or decimals value is out of range.
    pub fn into_pool(self) -> Result<LiquidityPool, StoreError> {
        let token = |id: String,
                     address: String,
                     symbol: String,
                     decimals: i16,
                     kind: &str,
                     side: &str| {
            let decimals = u8::try_from(decimals)
                .map_err(|_| StoreError::Corrupt(format!("token_{side}_decimals: {decimals}")))?;
            Ok::<_, StoreError>(Token {
                id: TokenId(id),
                address,
                symbol,
                decimals,
                kind: parse_column(&format!("token_{side}_kind"), kind)?,
            })
        };

        Ok(LiquidityPool {
            id: PoolId(self.id),
            dex: parse_column("dex", &self.dex)?,
            chain: parse_column("chain", &self.chain)?,
            network: parse_column("network", &self.network)?,
            address: self.address,
            token_a: token(
                self.token_a_id,
                self.token_a_address,
                self.token_a_symbol,
                self.token_a_decimals,
                &self.token_a_kind,
                "a",
            )?,
            token_b: token(
                self.token_b_id,
                self.token_b_address,
                self.token_b_symbol,
                self.token_b_decimals,
                &self.token_b_kind,
                "b",
            )?,
            fee_rate: self.fee_rate,
            tick_spacing: self.tick_spacing,
        })
    }
}

/// Repository for liquidity pools.
#[derive(Clone)]
pub struct PoolRepository {
    pool: Arc<PgPool>,
}

impl PoolRepository {
    /// Creates a new PoolRepository.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Finds a pool by its ID.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PoolRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM liquidity_pools WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        row.as_ref().map(PoolRecord::from_row).transpose()
    }

    /// Creates or updates a pool, keyed by (chain, network, address).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn upsert(&self, pool: &LiquidityPool) -> Result<PoolRecord, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO liquidity_pools (id, dex, chain, network, address,
                token_a_id, token_a_address, token_a_symbol, token_a_decimals, token_a_kind,
                token_b_id, token_b_address, token_b_symbol, token_b_decimals, token_b_kind,
                fee_rate, tick_spacing)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (chain, network, address) DO UPDATE SET
                dex = EXCLUDED.dex,
                fee_rate = EXCLUDED.fee_rate,
                tick_spacing = EXCLUDED.tick_spacing
            RETURNING *
            "#,
        )
        .bind(pool.id.0)
        .bind(pool.dex.to_string())
        .bind(pool.chain.to_string())
        .bind(pool.network.to_string())
        .bind(&pool.address)
        .bind(pool.token_a.id.as_str())
        .bind(&pool.token_a.address)
        .bind(&pool.token_a.symbol)
        .bind(i16::from(pool.token_a.decimals))
        .bind(pool.token_a.kind.to_string())
        .bind(pool.token_b.id.as_str())
        .bind(&pool.token_b.address)
        .bind(&pool.token_b.symbol)
        .bind(i16::from(pool.token_b.decimals))
        .bind(pool.token_b.kind.to_string())
        .bind(pool.fee_rate)
        .bind(pool.tick_spacing)
        .fetch_one(self.pool.as_ref())
        .await?;
        PoolRecord::from_row(&row)
    }
}

#[async_trait]
impl PoolStore for PoolRepository {
    async fn find_pool(&self, id: &PoolId) -> Result<Option<LiquidityPool>, StoreError> {
        self.find_by_id(id.0)
            .await?
            .map(PoolRecord::into_pool)
            .transpose()
    }
}
