//! Two-tier cache-aside store.
//!
//! L1 is process-local with short TTLs, L2 is shared Redis. The cache is an
//! optimization layer: tier failures are logged and swallowed, never surfaced.

mod local;
mod redis;
mod tier;
mod tiered;

pub use local::*;
pub use self::redis::*;
pub use tier::*;
pub use tiered::*;
