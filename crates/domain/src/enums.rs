use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn unknown(kind: &'static str, value: &str) -> DomainError {
    DomainError::UnknownVariant {
        kind,
        value: value.to_string(),
    }
}

/// Supported blockchains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Sui,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Solana => write!(f, "solana"),
            Chain::Sui => write!(f, "sui"),
        }
    }
}

impl FromStr for Chain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solana" => Ok(Chain::Solana),
            "sui" => Ok(Chain::Sui),
            other => Err(unknown("chain", other)),
        }
    }
}

/// Network a chain is addressed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Devnet => write!(f, "devnet"),
        }
    }
}

impl FromStr for Network {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(unknown("network", other)),
        }
    }
}

/// Decentralized exchanges with a registered action adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dex {
    OrcaWhirlpools,
    Raydium,
    MeteoraDlmm,
    Cetus,
    Turbos,
}

impl Dex {
    /// Chain the exchange is deployed on.
    #[must_use]
    pub fn chain(&self) -> Chain {
        match self {
            Dex::OrcaWhirlpools | Dex::Raydium | Dex::MeteoraDlmm => Chain::Solana,
            Dex::Cetus | Dex::Turbos => Chain::Sui,
        }
    }
}

impl fmt::Display for Dex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dex::OrcaWhirlpools => "orca_whirlpools",
            Dex::Raydium => "raydium",
            Dex::MeteoraDlmm => "meteora_dlmm",
            Dex::Cetus => "cetus",
            Dex::Turbos => "turbos",
        };
        f.write_str(name)
    }
}

impl FromStr for Dex {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orca_whirlpools" => Ok(Dex::OrcaWhirlpools),
            "raydium" => Ok(Dex::Raydium),
            "meteora_dlmm" => Ok(Dex::MeteoraDlmm),
            "cetus" => Ok(Dex::Cetus),
            "turbos" => Ok(Dex::Turbos),
            other => Err(unknown("dex", other)),
        }
    }
}

/// Role a token plays in a user's farming strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// USD-pegged stablecoin.
    Stable,
    /// The chain's native asset (SOL, SUI).
    Native,
    /// Any other asset.
    Volatile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Stable => write!(f, "stable"),
            TokenKind::Native => write!(f, "native"),
            TokenKind::Volatile => write!(f, "volatile"),
        }
    }
}

impl FromStr for TokenKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(TokenKind::Stable),
            "native" => Ok(TokenKind::Native),
            "volatile" => Ok(TokenKind::Volatile),
            other => Err(unknown("token kind", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dex_chain_mapping() {
        assert_eq!(Dex::OrcaWhirlpools.chain(), Chain::Solana);
        assert_eq!(Dex::Cetus.chain(), Chain::Sui);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(Chain::Solana.to_string(), "solana");
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
        assert_eq!(Dex::MeteoraDlmm.to_string(), "meteora_dlmm");
    }

    #[test]
    fn test_from_str_round_trips_display() {
        for dex in [Dex::OrcaWhirlpools, Dex::Raydium, Dex::MeteoraDlmm, Dex::Cetus, Dex::Turbos] {
            assert_eq!(dex.to_string().parse::<Dex>(), Ok(dex));
        }
        assert_eq!("sui".parse::<Chain>(), Ok(Chain::Sui));
        assert_eq!("devnet".parse::<Network>(), Ok(Network::Devnet));
        assert!("ethereum".parse::<Chain>().is_err());
        assert_eq!("stable".parse::<TokenKind>(), Ok(TokenKind::Stable));
    }
}
