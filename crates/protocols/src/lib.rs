//! Protocol access for the LP bot.
//!
//! - Bounded retry policies
//! - Load-balanced, failover RPC endpoint access
//! - DEX action adapters and their registry
//! - Transaction signer interface

/// DEX action adapters.
pub mod dex;
/// Prelude module for convenient imports.
pub mod prelude;
/// Bounded retry execution.
pub mod retry;
/// RPC endpoint balancing and JSON-RPC client.
pub mod rpc;
/// Transaction signer interface.
pub mod signer;
