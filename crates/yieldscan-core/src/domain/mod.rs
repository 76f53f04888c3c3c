//! # Domain Models
//!
//! Canonical domain types for yieldscan.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated, upper-cased ticker |
//! | [`Quote`] | Last price reported by a source |
//! | [`DividendHistory`] | Raw per-date dividend entries for a symbol |
//! | [`DividendRecord`] | Dividend total for one calendar year |
//! | [`YieldEstimate`] | Trailing average annual dividend |
//! | [`ValuationResult`] | Fair value, market price and signal |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Every value carries the symbol it was fetched for; constructors never
//! substitute one instrument for another.

mod models;
mod symbol;
mod timestamp;

pub use models::{
    DividendEntry, DividendHistory, DividendRecord, Quote, Signal, ValuationResult, YieldEstimate,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
