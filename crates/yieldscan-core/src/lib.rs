//! # Yieldscan Core
//!
//! Concurrent multi-source quote aggregation and dividend valuation.
//!
//! ## Overview
//!
//! - **Source clients** for a crypto exchange, an equity quote and dividend
//!   provider, and equity listing snapshots
//! - **Symbol classifier** partitioning requests by market universe
//! - **Batch fetcher** with bounded in-flight requests, timeouts and retry
//! - **Dividend estimator** folding monthly series into a trailing average
//! - **Valuation engine** ranking symbols by market price against fair value
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Binance, Alpha Vantage, Datahub) |
//! | [`aggregator`] | End-to-end quote, dividend and ranking requests |
//! | [`batch`] | Concurrent per-symbol batch fetcher |
//! | [`classifier`] | Symbol to market partitioning |
//! | [`config`] | Aggregator configuration |
//! | [`data_source`] | Data source trait and failure taxonomy |
//! | [`dividend`] | Yearly totals and trailing averages |
//! | [`domain`] | Domain models (Quote, DividendHistory, ValuationResult) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`provider_policy`] | Per-provider concurrency and timeout limits |
//! | [`retry`] | Backoff and retry policy |
//! | [`source`] | Provider and market identifiers |
//! | [`throttling`] | Request quota pacing |
//! | [`valuation`] | Fair value and ranking |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use yieldscan_core::{Aggregator, AggregatorConfig, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AggregatorConfig::load(None)?;
//!     let aggregator = Aggregator::from_config(config, Arc::new(ReqwestHttpClient::new()))?;
//!
//!     let report = aggregator.rank(&["KO", "PEP", "BTC"]).await?;
//!     for valuation in &report.valuations {
//!         println!("{} {} {}", valuation.symbol, valuation.difference, valuation.signal.as_str());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! symbols ─▶ Classifier ─▶ per-market subsets
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!      BatchFetcher (quotes)        BatchFetcher (dividends)
//!              │                               │
//!              │                     Dividend Estimator
//!              └───────────────┬───────────────┘
//!                              ▼
//!                      Valuation Engine ─▶ ranked results
//! ```
//!
//! ## Security
//!
//! API keys are read from configuration or environment variables and are
//! redacted from logs, errors and `Debug` output.

pub mod adapters;
pub mod aggregator;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod data_source;
pub mod dividend;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod provider_policy;
pub mod retry;
pub mod source;
pub mod throttling;
pub mod valuation;

// Adapter implementations
pub use adapters::{AlphaVantageAdapter, BinanceAdapter, DatahubListingAdapter};

// Orchestration
pub use aggregator::{
    Aggregator, AggregatorBuilder, Degradation, DegradationReason, MarketSources, QuoteReport,
    RankingReport, SymbolFailure, UniverseReport, UniverseSnapshot, YieldReport,
};

// Batching and classification
pub use batch::{BatchFetcher, BatchOutcome};
pub use classifier::{classify, Classification};

pub use config::AggregatorConfig;

// Data source trait and types
pub use data_source::{
    CapabilitySet, DataSource, Endpoint, FetchError, FetchErrorKind, SourceFuture, Universe,
};

pub use dividend::{DividendWindow, DEFAULT_TRAILING_YEARS};

// Domain models
pub use domain::{
    DividendEntry, DividendHistory, DividendRecord, Quote, Signal, Symbol, UtcDateTime,
    ValuationResult, YieldEstimate,
};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use provider_policy::SourcePolicy;
pub use retry::{Backoff, RetryConfig};
pub use source::{Market, ProviderId};
pub use throttling::RequestThrottle;
pub use valuation::{valuate, Valuation, DEFAULT_TARGET_YIELD_RATE};
