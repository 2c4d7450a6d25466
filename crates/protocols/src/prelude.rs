//! Prelude module for convenient imports.
//!
//! ```rust
//! use lpbot_protocols::prelude::*;
//! ```

pub use crate::dex::{
    ClosePositionParams, ClosedPosition, DexAdapter, DexContext, DexError, DexRegistry,
    FetchedPool, OpenPositionParams, OpenedPosition, PoolFetchContext, SwapParams, SwapResult,
};
pub use crate::retry::{RetryPolicy, retry};
pub use crate::rpc::{
    BalancerConfig, EndpointGroups, JsonRpcClient, JsonRpcError, RpcEndpointBalancer, RpcError,
};
pub use crate::signer::{PreparedAction, Signer, SignerError, SubmittedTx};
