use crate::entities::pool::PoolId;
use crate::enums::{Chain, TokenKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-chain account reference. `key_handle` is opaque; only the signer resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub chain: Chain,
    pub address: String,
    pub key_handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Token kind the user's strategy farms and tries to retain.
    pub farm_token_kind: TokenKind,
    pub wallets: Vec<Wallet>,
    /// Pool the user currently provides liquidity to.
    pub assigned_pool_id: Option<PoolId>,
}

impl User {
    pub fn wallet_for(&self, chain: Chain) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.chain == chain)
    }
}
