use thiserror::Error;

/// Errors raised by domain validation and math.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid tick range: lower {lower} must be below upper {upper}")]
    InvalidTickRange { lower: i32, upper: i32 },

    #[error("tick {0} has no representable bin")]
    TickOutOfRange(i32),

    #[error("tick spacing must be positive, got {0}")]
    InvalidTickSpacing(i32),

    #[error("invalid price band: lower {lower} must be below upper {upper}")]
    InvalidPriceBand { lower: String, upper: String },

    #[error("fee rate {0} is outside [0, 1)")]
    InvalidFeeRate(String),

    #[error("price conversion overflow at tick {0}")]
    PriceOverflow(i32),

    #[error("price must be positive")]
    NonPositivePrice,

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("no pool token matches farm token kind {0}")]
    NoPriorityToken(String),
}
