//! Partitions requested symbols by the market whose universe knows them.

use std::collections::{BTreeMap, BTreeSet};

use crate::data_source::Universe;
use crate::{Market, Symbol};

/// Disjoint per-market symbol lists plus the symbols no universe knows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub assignments: BTreeMap<Market, Vec<Symbol>>,
    pub unrecognized: Vec<Symbol>,
}

/// Assigns each symbol to the first market in [`Market::PRIORITY`] whose
/// universe contains it.
///
/// Request order is kept within each market and duplicates are dropped.
/// Markets without a universe entry are skipped.
pub fn classify(symbols: &[Symbol], universes: &BTreeMap<Market, Universe>) -> Classification {
    let mut classification = Classification::default();
    let mut seen = BTreeSet::new();

    for symbol in symbols {
        if !seen.insert(symbol) {
            continue;
        }

        let market = Market::PRIORITY.into_iter().find(|market| {
            universes
                .get(market)
                .is_some_and(|universe| universe.contains(symbol))
        });

        match market {
            Some(market) => classification
                .assignments
                .entry(market)
                .or_default()
                .push(symbol.clone()),
            None => classification.unrecognized.push(symbol.clone()),
        }
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(raw: &[&str]) -> Vec<Symbol> {
        raw.iter()
            .map(|value| Symbol::parse(value).expect("valid symbol"))
            .collect()
    }

    fn assigned(result: &Classification, market: Market) -> Vec<Symbol> {
        result.assignments.get(&market).cloned().unwrap_or_default()
    }

    fn classified_len(result: &Classification) -> usize {
        result.assignments.values().map(Vec::len).sum()
    }

    fn universes() -> BTreeMap<Market, Universe> {
        BTreeMap::from([
            (Market::Crypto, Universe::new(symbols(&["BTC", "ETH", "COIN"]))),
            (Market::Equity, Universe::new(symbols(&["AAPL", "KO", "COIN"]))),
        ])
    }

    #[test]
    fn partitions_by_universe_membership() {
        let result = classify(&symbols(&["AAPL", "BTC", "KO", "ETH"]), &universes());

        assert_eq!(assigned(&result, Market::Crypto), symbols(&["BTC", "ETH"]));
        assert_eq!(assigned(&result, Market::Equity), symbols(&["AAPL", "KO"]));
        assert!(result.unrecognized.is_empty());
    }

    #[test]
    fn symbol_in_both_universes_goes_to_crypto() {
        let result = classify(&symbols(&["COIN"]), &universes());

        assert_eq!(assigned(&result, Market::Crypto), symbols(&["COIN"]));
        assert!(assigned(&result, Market::Equity).is_empty());
    }

    #[test]
    fn unknown_symbols_are_reported_not_dropped() {
        let result = classify(&symbols(&["AAPL", "ZZZZ"]), &universes());

        assert_eq!(result.unrecognized, symbols(&["ZZZZ"]));
        assert_eq!(classified_len(&result), 1);
    }

    #[test]
    fn duplicate_requests_are_classified_once() {
        let result = classify(&symbols(&["KO", "KO", "BTC", "KO"]), &universes());

        assert_eq!(assigned(&result, Market::Equity), symbols(&["KO"]));
        assert_eq!(classified_len(&result), 2);
    }

    #[test]
    fn missing_universe_makes_its_symbols_unrecognized() {
        let only_equity = BTreeMap::from([(Market::Equity, Universe::new(symbols(&["AAPL"])))]);
        let result = classify(&symbols(&["BTC", "AAPL"]), &only_equity);

        assert_eq!(result.unrecognized, symbols(&["BTC"]));
    }

    #[test]
    fn classification_is_deterministic() {
        let input = symbols(&["ETH", "KO", "NOPE", "COIN", "AAPL"]);
        assert_eq!(classify(&input, &universes()), classify(&input, &universes()));
    }
}
