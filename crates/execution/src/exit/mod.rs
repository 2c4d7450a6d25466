//! Reactive exit decisions on price updates.

mod engine;

pub use engine::*;
