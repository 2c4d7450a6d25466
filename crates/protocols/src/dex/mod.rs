//! DEX action adapters.
//!
//! Each exchange supplies one [`DexAdapter`]; the transaction bytes it builds
//! are its own business. Adapters are looked up through a [`DexRegistry`]
//! populated at startup.

mod registry;

pub use registry::DexRegistry;

use crate::rpc::{JsonRpcClient, JsonRpcError, RpcEndpointBalancer, RpcError};
use crate::signer::{Signer, SignerError};
use async_trait::async_trait;
use lpbot_domain::entities::{FetchedPoolState, LiquidityPool, Position, TickRange, Wallet};
use lpbot_domain::enums::{Dex, Network};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DexError {
    #[error("no adapter registered for {0}")]
    UnsupportedDex(Dex),

    #[error("rpc failure: {0}")]
    Rpc(String),

    #[error("endpoint group {0} is not configured")]
    NoEndpoints(String),

    /// Every endpoint of the group was retried and failed; `last` is the
    /// final client error as the endpoint returned it.
    #[error("all endpoints exhausted for {group}: {last}")]
    Exhausted {
        group: String,
        #[source]
        last: Arc<JsonRpcError>,
    },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl DexError {
    /// Whether retrying the same call may succeed. An exhausted group has
    /// already been retried on every endpoint.
    pub fn is_transient(&self) -> bool {
        matches!(self, DexError::Rpc(_))
    }
}

/// Lets adapters use `?` on [`RpcEndpointBalancer::with_client`] results.
impl From<RpcError<JsonRpcError>> for DexError {
    fn from(e: RpcError<JsonRpcError>) -> Self {
        match e {
            RpcError::UnknownGroup(group) | RpcError::EmptyGroup(group) => {
                DexError::NoEndpoints(group)
            }
            RpcError::Call(e) => DexError::Rpc(e.to_string()),
            RpcError::Exhausted { group, last } => DexError::Exhausted {
                group,
                last: Arc::new(last),
            },
        }
    }
}

/// Context for read-only pool discovery.
#[derive(Clone)]
pub struct PoolFetchContext {
    pub network: Network,
    pub rpc: Arc<RpcEndpointBalancer<JsonRpcClient>>,
    pub rpc_group: String,
}

/// Context for actions on behalf of one user.
#[derive(Clone)]
pub struct DexContext {
    pub wallet: Wallet,
    pub network: Network,
    pub signer: Arc<dyn Signer>,
    pub rpc: Arc<RpcEndpointBalancer<JsonRpcClient>>,
    pub rpc_group: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPool {
    pub pool: LiquidityPool,
    pub state: FetchedPoolState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionParams {
    pub pool: LiquidityPool,
    pub state: FetchedPoolState,
    pub range: TickRange,
    /// Amount of the farm token to zap into the position.
    pub amount: Decimal,
    pub priority_a_over_b: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPosition {
    pub tx_hash: String,
    pub liquidity: u128,
    /// Value deposited, denominated in the farm token.
    pub deposit_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosePositionParams {
    pub pool: LiquidityPool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedPosition {
    pub tx_hash: String,
    pub amount_a: Decimal,
    pub amount_b: Decimal,
}

/// Swap of one side's proceeds into the other side.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapParams {
    pub pool: LiquidityPool,
    /// Swap token B into token A when `true`, A into B otherwise.
    pub into_a: bool,
    pub amount_in: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResult {
    /// `None` when there was nothing to swap.
    pub tx_hash: Option<String>,
    pub amount_out: Decimal,
}

#[async_trait]
pub trait DexAdapter: Send + Sync {
    fn dex(&self) -> Dex;

    async fn fetch_pools(&self, ctx: &PoolFetchContext) -> Result<Vec<FetchedPool>, DexError>;

    async fn open_position(
        &self,
        ctx: &DexContext,
        params: &OpenPositionParams,
    ) -> Result<OpenedPosition, DexError>;

    async fn close_position(
        &self,
        ctx: &DexContext,
        params: &ClosePositionParams,
    ) -> Result<ClosedPosition, DexError>;

    async fn swap(&self, ctx: &DexContext, params: &SwapParams) -> Result<SwapResult, DexError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_exhausted_keeps_client_error() {
        let err = DexError::from(RpcError::Exhausted {
            group: "solana-mainnet".to_string(),
            last: JsonRpcError::Rpc {
                code: -32005,
                message: "rate limited".to_string(),
            },
        });

        assert!(!err.is_transient());
        match err.source().and_then(|s| s.downcast_ref::<JsonRpcError>()) {
            Some(JsonRpcError::Rpc { code, .. }) => assert_eq!(*code, -32005),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_single_call_failure_is_transient() {
        let err = DexError::from(RpcError::Call(JsonRpcError::MissingResult));
        assert!(err.is_transient());
        let err = DexError::from(RpcError::<JsonRpcError>::UnknownGroup("sui-devnet".to_string()));
        assert!(matches!(err, DexError::NoEndpoints(ref g) if g == "sui-devnet"));
        assert!(!err.is_transient());
    }
}
