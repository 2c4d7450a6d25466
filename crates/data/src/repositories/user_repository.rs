//! Users and their per-chain wallets.

use super::{StoreError, UserStore, parse_column};
use async_trait::async_trait;
use lpbot_domain::entities::{PoolId, User, UserId, Wallet};
use lpbot_domain::enums::{Chain, Network};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub farm_token_kind: String,
    pub assigned_pool_id: Option<Uuid>,
}

impl UserRecord {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            farm_token_kind: row.try_get("farm_token_kind")?,
            assigned_pool_id: row.try_get("assigned_pool_id")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub chain: String,
    pub address: String,
    /// Opaque reference understood only by the signer.
    pub key_handle: String,
}

impl WalletRecord {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            chain: row.try_get("chain")?,
            address: row.try_get("address")?,
            key_handle: row.try_get("key_handle")?,
        })
    }

    fn into_wallet(self) -> Result<Wallet, StoreError> {
        Ok(Wallet {
            chain: parse_column("chain", &self.chain)?,
            address: self.address,
            key_handle: self.key_handle,
        })
    }
}

/// Repository for users.
#[derive(Clone)]
pub struct UserRepository {
    pool: Arc<PgPool>,
}

impl UserRepository {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
        let row =
            sqlx::query("SELECT id, farm_token_kind, assigned_pool_id FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?;
        row.as_ref().map(UserRecord::from_row).transpose()
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn wallets(&self, user_id: Uuid) -> Result<Vec<WalletRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT chain, address, key_handle FROM user_wallets WHERE user_id = $1 ORDER BY chain",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter().map(WalletRecord::from_row).collect()
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let Some(record) = self.find_by_id(id.0).await? else {
            return Ok(None);
        };
        let wallets = self
            .wallets(record.id)
            .await?
            .into_iter()
            .map(WalletRecord::into_wallet)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(User {
            id: UserId(record.id),
            farm_token_kind: parse_column("farm_token_kind", &record.farm_token_kind)?,
            wallets,
            assigned_pool_id: record.assigned_pool_id.map(PoolId),
        }))
    }

    async fn active_user_ids(
        &self,
        chain: Chain,
        network: Network,
    ) -> Result<Vec<UserId>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT p.user_id
            FROM positions p
            JOIN liquidity_pools lp ON lp.id = p.pool_id
            WHERE p.is_active AND lp.chain = $1 AND lp.network = $2
            ORDER BY p.user_id
            "#,
        )
        .bind(chain.to_string())
        .bind(network.to_string())
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter()
            .map(|row| -> Result<UserId, StoreError> { Ok(UserId(row.try_get("user_id")?)) })
            .collect()
    }
}
