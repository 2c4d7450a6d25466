//! Error taxonomy for the lifecycle engine.

use lpbot_data::lock::LockError;
use lpbot_data::repositories::StoreError;
use lpbot_domain::DomainError;
use lpbot_domain::entities::{PoolId, UserId};
use lpbot_domain::enums::Chain;
use lpbot_protocols::dex::DexError;
use lpbot_protocols::rpc::JsonRpcError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LpError {
    /// No fresh cached on-chain state; never act without it.
    #[error("no fresh cached state for pool {0}")]
    PoolStateNotFound(PoolId),

    #[error("pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("user {user} has no wallet on {chain}")]
    WalletNotFound { user: UserId, chain: Chain },

    #[error("user {user} has no active position in pool {pool}")]
    PositionNotFound { user: UserId, pool: PoolId },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("timed out after {waited:?} waiting for lock {key}")]
    LockContention { key: String, waited: Duration },

    #[error("lock {key} expired after {lease_ttl:?}")]
    LockExpired { key: String, lease_ttl: Duration },

    #[error("validation failed: {0}")]
    Validation(String),

    /// Every endpoint and retry was spent; `last` is the final client error, unwrapped.
    #[error("all endpoints exhausted for {group}: {last}")]
    Exhausted {
        group: String,
        #[source]
        last: Arc<JsonRpcError>,
    },

    #[error(transparent)]
    Dex(DexError),

    #[error(transparent)]
    Store(StoreError),
}

impl LpError {
    /// Whether the operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            LpError::Transient(_) => true,
            LpError::Dex(e) => e.is_transient(),
            LpError::Store(StoreError::Database(_)) => true,
            _ => false,
        }
    }
}

impl From<LockError> for LpError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Contention { key, waited } => LpError::LockContention { key, waited },
            LockError::Expired { key, lease_ttl } => LpError::LockExpired { key, lease_ttl },
            LockError::Backend(msg) => LpError::Transient(msg),
        }
    }
}

impl From<DexError> for LpError {
    fn from(e: DexError) -> Self {
        match e {
            DexError::Exhausted { group, last } => LpError::Exhausted { group, last },
            other => LpError::Dex(other),
        }
    }
}

impl From<StoreError> for LpError {
    fn from(e: StoreError) -> Self {
        LpError::Store(e)
    }
}

impl From<DomainError> for LpError {
    fn from(e: DomainError) -> Self {
        LpError::Validation(e.to_string())
    }
}
