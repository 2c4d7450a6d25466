pub mod pool;
pub mod position;
pub mod token;
pub mod user;

// Re-export for easier access
pub use pool::{FetchedPoolState, LiquidityPool, PoolId};
pub use position::{Position, PositionId, TickRange};
pub use token::{Token, TokenId};
pub use user::{User, UserId, Wallet};
