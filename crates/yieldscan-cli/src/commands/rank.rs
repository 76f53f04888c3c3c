use rust_decimal::Decimal;
use serde::Serialize;
use yieldscan_core::{Aggregator, RankingReport, ValuationResult};

use crate::cli::{RankMarketArgs, SymbolsArgs};
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct RankResponseData<'a> {
    target_yield_rate: Decimal,
    valuations: &'a [ValuationResult],
}

pub async fn run(args: &SymbolsArgs, aggregator: &Aggregator) -> Result<CommandResult, CliError> {
    let report = aggregator.rank(args.symbols.as_slice()).await?;
    into_result(report, aggregator.target_yield_rate())
}

pub async fn run_market(
    args: &RankMarketArgs,
    aggregator: &Aggregator,
) -> Result<CommandResult, CliError> {
    let report = aggregator.rank_market(args.market.into(), args.limit).await?;
    into_result(report, aggregator.target_yield_rate())
}

fn into_result(report: RankingReport, target_yield_rate: Decimal) -> Result<CommandResult, CliError> {
    let table = Table::new(["rank", "symbol", "market_price", "fair_value", "difference", "signal"])
        .with_rows(report.valuations.iter().enumerate().map(|(index, valuation)| {
            vec![
                (index + 1).to_string(),
                valuation.symbol.to_string(),
                valuation.market_price.normalize().to_string(),
                valuation.fair_value.round_dp(2).to_string(),
                valuation.difference.round_dp(2).to_string(),
                valuation.signal.as_str().to_owned(),
            ]
        }));

    let data = serde_json::to_value(RankResponseData {
        target_yield_rate,
        valuations: &report.valuations,
    })?;

    Ok(CommandResult {
        data,
        table,
        failures: report.failures,
        degraded: report.degraded,
    })
}
