//! Key builders shared by every component touching the cache or locks.

use lpbot_domain::entities::{PoolId, TokenId, UserId};
use lpbot_domain::enums::{Chain, Network};

/// Latest fetched on-chain state of a pool.
pub fn pool_state(chain: Chain, network: Network, pool: &PoolId) -> String {
    format!("pool-state:{chain}:{network}:{pool}")
}

/// USD price of a token; mainnet and testnet prices never share a key.
pub fn token_price(chain: Chain, network: Network, token: &TokenId) -> String {
    format!("price:{chain}:{network}:{token}")
}

/// Cached snapshot of a user's active positions.
pub fn user_snapshot(user: &UserId) -> String {
    format!("user-state:{user}")
}

/// Serializes exit evaluation for one token.
pub fn exit_lock(chain: Chain, network: Network, token: &TokenId) -> String {
    format!("exit-{chain}-{network}-{token}")
}

/// Serializes open/close for one user.
pub fn position_lock(chain: Chain, network: Network, user: &UserId) -> String {
    format!("position-{chain}-{network}-{user}")
}
