use super::{NewPosition, PoolStore, PositionClose, PositionStore, StoreError, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use lpbot_domain::entities::{LiquidityPool, PoolId, Position, PositionId, User, UserId};
use lpbot_domain::enums::{Chain, Network};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    pools: HashMap<PoolId, LiquidityPool>,
    users: HashMap<UserId, User>,
    positions: Vec<Position>,
}

/// Process-local store with the same transactional semantics as [`super::Database`].
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_pool(&self, pool: LiquidityPool) {
        self.state.write().await.pools.insert(pool.id, pool);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Every position ever recorded, in insertion order.
    pub async fn positions(&self) -> Vec<Position> {
        self.state.read().await.positions.clone()
    }
}

#[async_trait]
impl PoolStore for InMemoryStore {
    async fn find_pool(&self, id: &PoolId) -> Result<Option<LiquidityPool>, StoreError> {
        Ok(self.state.read().await.pools.get(id).cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn active_user_ids(
        &self,
        chain: Chain,
        network: Network,
    ) -> Result<Vec<UserId>, StoreError> {
        let state = self.state.read().await;
        let ids: BTreeSet<UserId> = state
            .positions
            .iter()
            .filter(|p| p.is_active)
            .filter(|p| {
                state
                    .pools
                    .get(&p.pool_id)
                    .is_some_and(|pool| pool.chain == chain && pool.network == network)
            })
            .map(|p| p.user_id)
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl PositionStore for InMemoryStore {
    async fn active_position(
        &self,
        user: &UserId,
        pool: &PoolId,
    ) -> Result<Option<Position>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .positions
            .iter()
            .find(|p| p.is_active && &p.user_id == user && &p.pool_id == pool)
            .cloned())
    }

    async fn active_positions(&self, user: &UserId) -> Result<Vec<Position>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .positions
            .iter()
            .filter(|p| p.is_active && &p.user_id == user)
            .cloned()
            .collect())
    }

    async fn record_open(
        &self,
        user: &UserId,
        position: NewPosition,
    ) -> Result<Position, StoreError> {
        let mut state = self.state.write().await;
        let State { users, positions, .. } = &mut *state;

        let owner = users
            .get_mut(user)
            .ok_or_else(|| StoreError::NotFound(format!("user {user}")))?;
        if positions
            .iter()
            .any(|p| p.is_active && &p.user_id == user && p.pool_id == position.pool_id)
        {
            return Err(StoreError::Corrupt(format!(
                "user {user} already has an active position in pool {}",
                position.pool_id
            )));
        }

        let stored = Position {
            id: PositionId(Uuid::new_v4()),
            pool_id: position.pool_id,
            user_id: *user,
            range: position.range,
            liquidity: position.liquidity,
            deposit_amount: position.deposit_amount,
            priority_a_over_b: position.priority_a_over_b,
            open_tx_hash: position.open_tx_hash,
            close_tx_hash: None,
            roi: None,
            pnl: None,
            is_active: true,
            opened_at: Utc::now(),
            closed_at: None,
        };
        owner.assigned_pool_id = Some(position.pool_id);
        positions.push(stored.clone());
        Ok(stored)
    }

    async fn record_close(
        &self,
        user: &UserId,
        position: &PositionId,
        close: PositionClose,
    ) -> Result<Position, StoreError> {
        let mut state = self.state.write().await;
        let State { users, positions, .. } = &mut *state;

        let stored = positions
            .iter_mut()
            .find(|p| &p.id == position && &p.user_id == user)
            .ok_or_else(|| StoreError::NotFound(format!("position {position}")))?;
        if !stored.close(close.close_tx_hash, close.pnl, close.roi, close.closed_at) {
            return Err(StoreError::AlreadyClosed(*position));
        }
        let pool_id = stored.pool_id;
        if let Some(owner) = users
            .get_mut(user)
            .filter(|owner| owner.assigned_pool_id == Some(pool_id))
        {
            owner.assigned_pool_id = None;
        }
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lpbot_domain::entities::{TickRange, Token};
    use lpbot_domain::enums::{Dex, TokenKind};
    use rust_decimal_macros::dec;

    fn pool(chain: Chain) -> LiquidityPool {
        LiquidityPool {
            id: PoolId(Uuid::new_v4()),
            dex: Dex::OrcaWhirlpools,
            chain,
            network: Network::Mainnet,
            address: "pool".to_string(),
            token_a: Token::new("sol", "So111", "SOL", 9, TokenKind::Native),
            token_b: Token::new("usdc", "EPjF", "USDC", 6, TokenKind::Stable),
            fee_rate: dec!(0.003),
            tick_spacing: 64,
        }
    }

    fn user() -> User {
        User {
            id: UserId(Uuid::new_v4()),
            farm_token_kind: TokenKind::Stable,
            wallets: Vec::new(),
            assigned_pool_id: None,
        }
    }

    fn new_position(pool: &LiquidityPool) -> NewPosition {
        NewPosition {
            pool_id: pool.id,
            range: TickRange::new(-64, 0).unwrap(),
            liquidity: 1_000_000,
            deposit_amount: dec!(100),
            priority_a_over_b: false,
            open_tx_hash: "open-tx".to_string(),
        }
    }

    fn close() -> PositionClose {
        PositionClose {
            close_tx_hash: "close-tx".to_string(),
            pnl: dec!(5),
            roi: dec!(0.05),
            closed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_then_close_updates_pointer() {
        let store = InMemoryStore::new();
        let pool = pool(Chain::Solana);
        let user = user();
        store.insert_pool(pool.clone()).await;
        store.insert_user(user.clone()).await;

        let opened = store.record_open(&user.id, new_position(&pool)).await.unwrap();
        assert!(opened.is_active);
        let loaded = store.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.assigned_pool_id, Some(pool.id));

        let closed = store.record_close(&user.id, &opened.id, close()).await.unwrap();
        assert!(!closed.is_active);
        assert_eq!(closed.roi, Some(dec!(0.05)));
        let loaded = store.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.assigned_pool_id, None);
    }

    #[tokio::test]
    async fn test_closing_old_position_keeps_newer_pointer() {
        let store = InMemoryStore::new();
        let (old_pool, new_pool) = (pool(Chain::Solana), pool(Chain::Solana));
        let user = user();
        store.insert_pool(old_pool.clone()).await;
        store.insert_pool(new_pool.clone()).await;
        store.insert_user(user.clone()).await;

        let old = store.record_open(&user.id, new_position(&old_pool)).await.unwrap();
        store.record_open(&user.id, new_position(&new_pool)).await.unwrap();
        store.record_close(&user.id, &old.id, close()).await.unwrap();

        let loaded = store.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.assigned_pool_id, Some(new_pool.id));
    }

    #[tokio::test]
    async fn test_close_is_one_way() {
        let store = InMemoryStore::new();
        let pool = pool(Chain::Solana);
        let user = user();
        store.insert_pool(pool.clone()).await;
        store.insert_user(user.clone()).await;

        let opened = store.record_open(&user.id, new_position(&pool)).await.unwrap();
        store.record_close(&user.id, &opened.id, close()).await.unwrap();

        let again = store.record_close(&user.id, &opened.id, close()).await;
        assert!(matches!(again, Err(StoreError::AlreadyClosed(id)) if id == opened.id));
        assert_eq!(store.positions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_active_user_ids_filters_by_chain() {
        let store = InMemoryStore::new();
        let solana = pool(Chain::Solana);
        let sui = pool(Chain::Sui);
        let (alice, bob) = (user(), user());
        for p in [&solana, &sui] {
            store.insert_pool(p.clone()).await;
        }
        store.insert_user(alice.clone()).await;
        store.insert_user(bob.clone()).await;

        store.record_open(&alice.id, new_position(&solana)).await.unwrap();
        store.record_open(&bob.id, new_position(&sui)).await.unwrap();

        let ids = store.active_user_ids(Chain::Solana, Network::Mainnet).await.unwrap();
        assert_eq!(ids, vec![alice.id]);
    }

    #[tokio::test]
    async fn test_open_for_unknown_user_fails() {
        let store = InMemoryStore::new();
        let pool = pool(Chain::Solana);
        let result = store.record_open(&UserId(Uuid::new_v4()), new_position(&pool)).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(store.positions().await.is_empty());
    }
}
