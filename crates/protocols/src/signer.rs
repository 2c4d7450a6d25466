//! Signer interface.
//!
//! The engine never handles key material: adapters prepare an action and hand
//! it to a [`Signer`] together with the user's opaque wallet reference.

use async_trait::async_trait;
use lpbot_domain::entities::Wallet;
use lpbot_domain::enums::Chain;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("no key for handle {0}")]
    UnknownKey(String),

    #[error("wallet is on {wallet} but action targets {action}")]
    ChainMismatch { wallet: Chain, action: Chain },

    #[error("submission failed: {0}")]
    Submit(String),
}

/// A transaction prepared by a DEX adapter, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAction {
    pub chain: Chain,
    /// Short label for logs, e.g. `"open_position"`.
    pub label: String,
    /// Serialized unsigned transaction.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_hash: String,
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs `action` with the key behind `wallet` and submits it.
    async fn sign_and_submit(
        &self,
        wallet: &Wallet,
        action: PreparedAction,
    ) -> Result<SubmittedTx, SignerError>;
}

/// Rejects actions whose chain differs from the wallet's.
pub fn ensure_same_chain(wallet: &Wallet, action: &PreparedAction) -> Result<(), SignerError> {
    if wallet.chain != action.chain {
        return Err(SignerError::ChainMismatch {
            wallet: wallet.chain,
            action: action.chain,
        });
    }
    Ok(())
}
