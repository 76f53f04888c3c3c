//! Source client contract and failure taxonomy.
//!
//! Every external provider is wrapped by an adapter implementing
//! [`DataSource`]. One call performs at most one outbound HTTP request and
//! never retries; retry and concurrency policy live in
//! [`BatchFetcher`](crate::batch::BatchFetcher).
//!
//! | Endpoint | Method | Result |
//! |----------|--------|--------|
//! | Universe | [`DataSource::universe`] | [`Universe`] |
//! | Quote | [`DataSource::quote`] | [`Quote`] |
//! | Dividends | [`DataSource::dividends`] | [`DividendHistory`] |

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::http_client::HttpError;
use crate::{DividendHistory, ProviderId, Quote, Symbol};

/// Data endpoint type used for capability checks and failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Universe,
    Quote,
    Dividends,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Universe => "universe",
            Self::Quote => "quote",
            Self::Dividends => "dividends",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub universe: bool,
    pub quote: bool,
    pub dividends: bool,
}

impl CapabilitySet {
    pub const fn new(universe: bool, quote: bool, dividends: bool) -> Self {
        Self {
            universe,
            quote,
            dividends,
        }
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Universe => self.universe,
            Endpoint::Quote => self.quote,
            Endpoint::Dividends => self.dividends,
        }
    }
}

/// Per-symbol failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// The provider does not know the symbol.
    NotFound,
    /// The provider is throttling requests.
    RateLimited,
    /// Network or upstream failure that may succeed on retry.
    Transient,
    /// The response did not have the expected shape.
    Malformed,
    /// The symbol matched no known source universe.
    Unrecognized,
    /// The source has no such endpoint for this market.
    Unsupported,
    /// Dividend history does not cover the configured window.
    InsufficientHistory,
}

impl FetchErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Malformed => "malformed",
            Self::Unrecognized => "unrecognized",
            Self::Unsupported => "unsupported",
            Self::InsufficientHistory => "insufficient_history",
        }
    }

    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure for one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transient, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Malformed, message)
    }

    pub fn unrecognized(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unrecognized, message)
    }

    pub fn unsupported(provider: ProviderId, endpoint: Endpoint) -> Self {
        Self::new(
            FetchErrorKind::Unsupported,
            format!("endpoint '{endpoint}' is not supported by '{provider}'"),
        )
    }

    /// Maps a non-success HTTP status onto the failure taxonomy.
    pub fn from_status(provider: ProviderId, status: u16) -> Self {
        let message = format!("{provider} returned status {status}");
        match status {
            404 => Self::not_found(message),
            // Binance answers 418 once a client ignored earlier 429s.
            418 | 429 => Self::rate_limited(message),
            408 | 500..=599 => Self::transient(message),
            _ => Self::malformed(message),
        }
    }

    pub fn from_transport(provider: ProviderId, error: &HttpError) -> Self {
        let what = if error.timed_out() {
            "request timed out"
        } else {
            "transport error"
        };
        Self::transient(format!("{provider} {what}: {}", error.message()))
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for FetchError {}

/// Set of symbols a source recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Universe {
    pub symbols: BTreeSet<Symbol>,
}

impl Universe {
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            symbols: symbols.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Source adapter contract.
///
/// Implementations must be `Send + Sync`: batches share one adapter across
/// spawned fetch tasks through an `Arc`.
pub trait DataSource: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Returns the set of supported endpoints.
    fn capabilities(&self) -> CapabilitySet;

    /// Fetches the set of symbols the source recognizes.
    ///
    /// Open query-by-symbol APIs have no fixed universe and report
    /// [`FetchErrorKind::Unsupported`].
    fn universe(&self) -> SourceFuture<'_, Universe>;

    /// Fetches the latest price for one symbol.
    fn quote(&self, symbol: Symbol) -> SourceFuture<'_, Quote>;

    /// Fetches the raw dividend time series for one symbol.
    fn dividends(&self, symbol: Symbol) -> SourceFuture<'_, DividendHistory>;
}
