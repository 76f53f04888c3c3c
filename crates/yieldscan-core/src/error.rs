use thiserror::Error;

/// Validation and contract errors exposed by `yieldscan-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of binance, alphavantage, datahub")]
    InvalidSource { value: String },
    #[error("invalid market '{value}', expected one of crypto, equity")]
    InvalidMarket { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("target yield rate must be greater than zero: '{value}'")]
    InvalidTargetYield { value: String },
    #[error("dividend window must span at least one year")]
    EmptyDividendWindow,
    #[error("max in-flight requests for '{provider}' must be greater than zero")]
    ZeroConcurrency { provider: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("all sources are unavailable: {}", .reasons.join("; "))]
    AllSourcesUnavailable { reasons: Vec<String> },
}
