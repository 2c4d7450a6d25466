use crate::DomainError;
use crate::entities::token::{Token, TokenId};
use crate::enums::{Chain, Dex, Network, TokenKind};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub Uuid);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of a concentrated-liquidity pool. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub id: PoolId,
    pub dex: Dex,
    pub chain: Chain,
    pub network: Network,
    /// On-chain pool address.
    pub address: String,
    pub token_a: Token,
    pub token_b: Token,
    /// Swap fee as a fraction, e.g. `0.003` for 30 bps.
    pub fee_rate: Decimal,
    pub tick_spacing: i32,
}

impl LiquidityPool {
    /// Whether either side of the pool is `token`.
    pub fn references_token(&self, token: &TokenId) -> bool {
        &self.token_a.id == token || &self.token_b.id == token
    }

    /// Resolves which side a farm token of `kind` should retain.
    ///
    /// Returns `true` when token A is the farm token, `false` when token B is.
    pub fn priority_a_over_b(&self, kind: TokenKind) -> Result<bool, DomainError> {
        if self.token_a.kind == kind {
            Ok(true)
        } else if self.token_b.kind == kind {
            Ok(false)
        } else {
            Err(DomainError::NoPriorityToken(kind.to_string()))
        }
    }
}

/// Live pool state fetched from chain. Only valid until `fetched_at + ttl_secs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPoolState {
    pub pool_id: PoolId,
    pub current_tick: i32,
    pub current_sqrt_price: u128,
    pub fetched_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl FetchedPoolState {
    /// `None` when the TTL does not fit a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = i64::try_from(self.ttl_secs).ok().and_then(Duration::try_seconds)?;
        self.fetched_at.checked_add_signed(ttl)
    }

    /// A state whose expiry cannot be represented counts as expired.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now < expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pool() -> LiquidityPool {
        LiquidityPool {
            id: PoolId(Uuid::new_v4()),
            dex: Dex::OrcaWhirlpools,
            chain: Chain::Solana,
            network: Network::Mainnet,
            address: "pool".to_string(),
            token_a: Token::new("sol", "So111", "SOL", 9, TokenKind::Native),
            token_b: Token::new("usdc", "EPjF", "USDC", 6, TokenKind::Stable),
            fee_rate: dec!(0.003),
            tick_spacing: 64,
        }
    }

    #[test]
    fn test_priority_resolution() {
        let pool = pool();
        assert_eq!(pool.priority_a_over_b(TokenKind::Native), Ok(true));
        assert_eq!(pool.priority_a_over_b(TokenKind::Stable), Ok(false));
        assert!(pool.priority_a_over_b(TokenKind::Volatile).is_err());
    }

    #[test]
    fn test_references_token() {
        let pool = pool();
        assert!(pool.references_token(&TokenId::new("sol")));
        assert!(!pool.references_token(&TokenId::new("bonk")));
    }

    #[test]
    fn test_pool_state_freshness() {
        let fetched_at = Utc::now();
        let state = FetchedPoolState {
            pool_id: PoolId(Uuid::new_v4()),
            current_tick: 10,
            current_sqrt_price: 1 << 64,
            fetched_at,
            ttl_secs: 30,
        };
        assert!(state.is_fresh(fetched_at + Duration::seconds(29)));
        assert!(!state.is_fresh(fetched_at + Duration::seconds(30)));
    }

    #[test]
    fn test_unrepresentable_ttl_is_expired() {
        let fetched_at = Utc::now();
        for ttl_secs in [u64::MAX, i64::MAX as u64, u64::MAX / 1000, 1 << 62] {
            let state = FetchedPoolState {
                pool_id: PoolId(Uuid::new_v4()),
                current_tick: 10,
                current_sqrt_price: 1 << 64,
                fetched_at,
                ttl_secs,
            };
            assert_eq!(state.expires_at(), None, "ttl {ttl_secs}");
            assert!(!state.is_fresh(fetched_at));
        }
    }
}
