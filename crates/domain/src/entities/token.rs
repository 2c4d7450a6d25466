use crate::enums::TokenKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Oracle-facing token identifier (e.g. `"sol"`, `"usdc"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        kind: TokenKind,
    ) -> Self {
        Self {
            id: TokenId::new(id),
            address: address.into(),
            symbol: symbol.into(),
            decimals,
            kind,
        }
    }
}
