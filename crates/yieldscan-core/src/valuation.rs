//! Fair-value estimation and ranking.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::data_source::FetchError;
use crate::domain::{Quote, ValuationResult, YieldEstimate};
use crate::{Symbol, ValidationError};

/// Target yield used when none is configured.
pub const DEFAULT_TARGET_YIELD_RATE: Decimal = dec!(0.05);

pub fn validate_target_yield(target_yield_rate: Decimal) -> Result<(), ValidationError> {
    if target_yield_rate <= Decimal::ZERO {
        return Err(ValidationError::InvalidTargetYield {
            value: target_yield_rate.to_string(),
        });
    }
    Ok(())
}

/// Ranked results plus the symbols whose fair value could not be computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    pub ranked: Vec<ValuationResult>,
    pub rejected: Vec<(Symbol, FetchError)>,
}

/// Values every symbol that has both a quote and a sufficient yield estimate.
///
/// `fair_value = average_annual_dividend / target_yield_rate`. Results are
/// ordered most undervalued first: ascending `market_price - fair_value`,
/// ties broken by symbol. A fair value outside the decimal range rejects the
/// symbol as `Malformed`.
pub fn valuate(
    quotes: &BTreeMap<Symbol, Quote>,
    yields: &BTreeMap<Symbol, YieldEstimate>,
    target_yield_rate: Decimal,
) -> Result<Valuation, ValidationError> {
    validate_target_yield(target_yield_rate)?;

    let mut valuation = Valuation::default();
    for (symbol, quote) in quotes {
        let Some(average) = yields.get(symbol).and_then(|estimate| estimate.average_annual_dividend) else {
            continue;
        };
        match average.checked_div(target_yield_rate) {
            Some(fair_value) => valuation
                .ranked
                .push(ValuationResult::new(symbol.clone(), quote.price, fair_value)),
            None => valuation.rejected.push((
                symbol.clone(),
                FetchError::malformed(format!(
                    "fair value {average} / {target_yield_rate} overflows the decimal range"
                )),
            )),
        }
    }

    rank(&mut valuation.ranked);
    Ok(valuation)
}

/// Sorts most undervalued first.
pub fn rank(results: &mut [ValuationResult]) {
    results.sort_by(|left, right| {
        left.difference
            .cmp(&right.difference)
            .then_with(|| left.symbol.cmp(&right.symbol))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::FetchErrorKind;
    use crate::domain::Signal;
    use crate::{ProviderId, UtcDateTime};

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    fn quotes(entries: &[(&str, Decimal)]) -> BTreeMap<Symbol, Quote> {
        entries
            .iter()
            .map(|(raw, price)| {
                let quote = Quote::new(symbol(raw), *price, ProviderId::Alphavantage, UtcDateTime::now())
                    .expect("valid quote");
                (symbol(raw), quote)
            })
            .collect()
    }

    fn yields(entries: &[(&str, Option<Decimal>)]) -> BTreeMap<Symbol, YieldEstimate> {
        entries
            .iter()
            .map(|(raw, average)| {
                let estimate = YieldEstimate {
                    symbol: symbol(raw),
                    average_annual_dividend: *average,
                    window: 5,
                    records: Vec::new(),
                };
                (symbol(raw), estimate)
            })
            .collect()
    }

    #[test]
    fn price_below_fair_value_is_a_buy() {
        let results = valuate(
            &quotes(&[("KO", dec!(90))]),
            &yields(&[("KO", Some(dec!(5)))]),
            dec!(0.05),
        )
        .expect("valuation")
        .ranked;

        let result = &results[0];
        assert_eq!(result.fair_value, dec!(100));
        assert_eq!(result.difference, dec!(-10));
        assert_eq!(result.signal, Signal::Buy);
    }

    #[test]
    fn price_at_or_above_fair_value_is_a_hold() {
        let results = valuate(
            &quotes(&[("KO", dec!(100)), ("PEP", dec!(120))]),
            &yields(&[("KO", Some(dec!(5))), ("PEP", Some(dec!(5)))]),
            dec!(0.05),
        )
        .expect("valuation")
        .ranked;

        assert!(results.iter().all(|result| result.signal == Signal::Hold));
    }

    #[test]
    fn only_symbols_in_both_inputs_are_valued() {
        let results = valuate(
            &quotes(&[("KO", dec!(50)), ("AAPL", dec!(180))]),
            &yields(&[("KO", Some(dec!(2))), ("T", Some(dec!(1)))]),
            dec!(0.05),
        )
        .expect("valuation")
        .ranked;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, symbol("KO"));
    }

    #[test]
    fn insufficient_history_is_not_valued_as_zero() {
        let results = valuate(
            &quotes(&[("NEW", dec!(10))]),
            &yields(&[("NEW", None)]),
            dec!(0.05),
        )
        .expect("valuation")
        .ranked;

        assert!(results.is_empty());
    }

    #[test]
    fn orders_most_undervalued_first() {
        let results = valuate(
            &quotes(&[("A", dec!(100)), ("B", dec!(40)), ("C", dec!(95)), ("D", dec!(40))]),
            &yields(&[
                ("A", Some(dec!(5))),
                ("B", Some(dec!(5))),
                ("C", Some(dec!(5))),
                ("D", Some(dec!(5))),
            ]),
            dec!(0.05),
        )
        .expect("valuation")
        .ranked;

        let order: Vec<&str> = results.iter().map(|result| result.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "D", "C", "A"]);
    }

    #[test]
    fn unrepresentable_fair_value_is_rejected_not_dropped() {
        let valuation = valuate(
            &quotes(&[("KO", dec!(90)), ("PEP", dec!(40))]),
            &yields(&[("KO", Some(Decimal::MAX)), ("PEP", Some(dec!(5)))]),
            dec!(0.05),
        )
        .expect("valuation");

        assert_eq!(valuation.ranked.len(), 1);
        assert_eq!(valuation.ranked[0].symbol, symbol("PEP"));
        assert_eq!(valuation.rejected.len(), 1);
        let (rejected, error) = &valuation.rejected[0];
        assert_eq!(rejected, &symbol("KO"));
        assert_eq!(error.kind(), FetchErrorKind::Malformed);
    }

    #[test]
    fn rejects_non_positive_target_yield() {
        let error = valuate(&BTreeMap::new(), &BTreeMap::new(), Decimal::ZERO)
            .expect_err("zero yield must fail");
        assert!(matches!(error, ValidationError::InvalidTargetYield { .. }));
    }
}
