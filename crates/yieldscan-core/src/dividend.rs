//! Folds raw dividend series into per-year totals and a trailing average.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data_source::FetchError;
use crate::domain::{DividendHistory, DividendRecord, YieldEstimate};
use crate::ValidationError;

/// Number of complete calendar years averaged by default.
pub const DEFAULT_TRAILING_YEARS: usize = 5;

/// Which calendar years feed the average.
///
/// The window is the `trailing_years` years ending just before the as-of
/// year, or ending at the as-of year when `exclude_current_year` is false.
/// Every year in the window must appear in the history; otherwise the
/// estimate reports insufficient history instead of averaging fewer years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DividendWindow {
    pub trailing_years: usize,
    pub exclude_current_year: bool,
}

impl Default for DividendWindow {
    fn default() -> Self {
        Self {
            trailing_years: DEFAULT_TRAILING_YEARS,
            exclude_current_year: true,
        }
    }
}

impl DividendWindow {
    pub fn new(trailing_years: usize) -> Result<Self, ValidationError> {
        let window = Self {
            trailing_years,
            ..Self::default()
        };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.trailing_years == 0 {
            return Err(ValidationError::EmptyDividendWindow);
        }
        Ok(())
    }

    /// Inclusive year range covered for the given as-of year.
    pub fn years(&self, as_of_year: i32) -> (i32, i32) {
        let last = if self.exclude_current_year {
            as_of_year - 1
        } else {
            as_of_year
        };
        let span = i32::try_from(self.trailing_years).unwrap_or(i32::MAX);
        (last.saturating_sub(span - 1), last)
    }
}

/// Sums dividend entries per calendar year, ascending by year.
///
/// Years present in the series with no payout produce a zero record, so a
/// monthly series still marks the years it covers. Totals that leave the
/// decimal range are reported as `Malformed`.
pub fn yearly_totals(history: &DividendHistory) -> Result<Vec<DividendRecord>, FetchError> {
    let mut totals: BTreeMap<i32, Decimal> = BTreeMap::new();
    for entry in &history.entries {
        let year = entry.date.year();
        let total = totals.entry(year).or_default();
        *total = total
            .checked_add(entry.amount)
            .ok_or_else(|| overflow(history, &format!("{year} dividend total")))?;
    }

    Ok(totals
        .into_iter()
        .map(|(year, total_amount)| DividendRecord {
            symbol: history.symbol.clone(),
            year,
            total_amount,
        })
        .collect())
}

/// Averages the yearly totals inside `window`.
pub fn estimate(
    history: &DividendHistory,
    window: DividendWindow,
    as_of_year: i32,
) -> Result<YieldEstimate, FetchError> {
    let (first, last) = window.years(as_of_year);
    let records: Vec<DividendRecord> = yearly_totals(history)?
        .into_iter()
        .filter(|record| (first..=last).contains(&record.year))
        .collect();

    let average_annual_dividend = if window.trailing_years > 0 && records.len() == window.trailing_years {
        let mut sum = Decimal::ZERO;
        for record in &records {
            sum = sum
                .checked_add(record.total_amount)
                .ok_or_else(|| overflow(history, "windowed dividend sum"))?;
        }
        Some(sum / Decimal::from(records.len()))
    } else {
        None
    };

    Ok(YieldEstimate {
        symbol: history.symbol.clone(),
        average_annual_dividend,
        window: window.trailing_years,
        records,
    })
}

fn overflow(history: &DividendHistory, what: &str) -> FetchError {
    FetchError::malformed(format!(
        "{} {what} overflows the decimal range",
        history.symbol
    ))
}
