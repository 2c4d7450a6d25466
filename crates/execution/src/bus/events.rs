use lpbot_domain::entities::TokenId;
use lpbot_domain::enums::{Chain, Dex, Network};
use serde::{Deserialize, Serialize};

pub const PRICE_UPDATED: &str = "price-updated";
pub const POOLS_FETCHED: &str = "pools-fetched";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LpEvent {
    /// A new oracle price for `token_id` is in the cache.
    PriceUpdated {
        chain: Chain,
        network: Network,
        token_id: TokenId,
    },
    /// Fresh pool states for one exchange were written to the cache.
    PoolsFetched {
        chain: Chain,
        network: Network,
        dex: Dex,
        count: usize,
        /// Pools currently eligible for an open on either side.
        eligible: usize,
    },
}

impl LpEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            LpEvent::PriceUpdated { .. } => PRICE_UPDATED,
            LpEvent::PoolsFetched { .. } => POOLS_FETCHED,
        }
    }
}
