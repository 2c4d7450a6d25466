//! Prelude module for convenient imports.

pub use crate::bus::{EventBus, EventHandler, LpEvent, POOLS_FETCHED, PRICE_UPDATED};
pub use crate::error::LpError;
pub use crate::exit::{
    ExitConfig, ExitDecisionEngine, ExitSweep, PositionCloser, PositionEvaluation, PositionVerdict,
};
pub use crate::lifecycle::{
    ClosePositionOutcome, LifecycleDeps, OpenPositionOutcome, OpenPositionRequest,
    OrchestratorConfig, PositionLifecycleOrchestrator, SnapshotBuilder, UserSnapshot,
};
pub use crate::pools::{DexRefresh, PoolEligibility, PoolStateRefresher, RefresherConfig};
pub use crate::settle::{Settled, log_failures, settle_all};
