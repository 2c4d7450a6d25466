//! Pool discovery and cached live state.

mod refresher;

pub use refresher::*;
