//! Position open/close orchestration and the per-user cached snapshot.

mod orchestrator;
mod snapshot;

pub use orchestrator::*;
pub use snapshot::*;
