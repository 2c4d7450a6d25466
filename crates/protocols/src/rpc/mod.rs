//! RPC endpoint access.
//!
//! Endpoints are grouped per chain/network. Each call picks a primary endpoint
//! with power-of-two-choices over a decaying health score, retries it per the
//! caller's [`RetryPolicy`](crate::retry::RetryPolicy), then fails over to the
//! remaining endpoints in configured order.

mod balancer;
mod client;
mod config;
mod health;

pub use balancer::*;
pub use client::*;
pub use config::*;
pub use health::*;
