use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{ProviderId, Symbol, UtcDateTime, ValidationError};

/// Last traded or closing price as reported by one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: Decimal,
    pub source: ProviderId,
    pub fetched_at: UtcDateTime,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        price: Decimal,
        source: ProviderId,
        fetched_at: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        Ok(Self {
            symbol,
            price,
            source,
            fetched_at,
        })
    }
}

/// One dividend distribution keyed by its series date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividendEntry {
    pub date: Date,
    pub amount: Decimal,
}

impl DividendEntry {
    pub fn new(date: Date, amount: Decimal) -> Result<Self, ValidationError> {
        validate_non_negative("dividend amount", amount)?;
        Ok(Self { date, amount })
    }
}

/// Raw dividend time series returned by a dividend-history source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DividendHistory {
    pub symbol: Symbol,
    pub source: ProviderId,
    pub fetched_at: UtcDateTime,
    pub entries: Vec<DividendEntry>,
}

/// Sum of all dividend distributions for a symbol within one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub symbol: Symbol,
    pub year: i32,
    pub total_amount: Decimal,
}

/// Average annual dividend over a trailing window of complete years.
///
/// `average_annual_dividend` is `None` when the history does not cover the
/// whole window. It is never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldEstimate {
    pub symbol: Symbol,
    pub average_annual_dividend: Option<Decimal>,
    pub window: usize,
    pub records: Vec<DividendRecord>,
}

impl YieldEstimate {
    pub fn is_sufficient(&self) -> bool {
        self.average_annual_dividend.is_some()
    }
}

/// Buy/hold classification derived from market price versus fair value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Hold,
}

impl Signal {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
        }
    }
}

/// Valuation of one symbol with both a quote and a yield estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub symbol: Symbol,
    pub market_price: Decimal,
    pub fair_value: Decimal,
    /// `market_price - fair_value`; negative means trading below fair value.
    pub difference: Decimal,
    pub signal: Signal,
}

impl ValuationResult {
    pub fn new(symbol: Symbol, market_price: Decimal, fair_value: Decimal) -> Self {
        let difference = market_price - fair_value;
        let signal = if difference < Decimal::ZERO {
            Signal::Buy
        } else {
            Signal::Hold
        };

        Self {
            symbol,
            market_price,
            fair_value,
            difference,
            signal,
        }
    }
}

fn validate_non_negative(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
