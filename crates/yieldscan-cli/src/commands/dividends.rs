use serde::Serialize;
use yieldscan_core::{Aggregator, YieldEstimate};

use crate::cli::SymbolsArgs;
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct DividendResponseData<'a> {
    estimates: Vec<&'a YieldEstimate>,
}

pub async fn run(args: &SymbolsArgs, aggregator: &Aggregator) -> Result<CommandResult, CliError> {
    let report = aggregator.dividends(args.symbols.as_slice()).await?;

    let estimates: Vec<&YieldEstimate> = report.estimates.values().collect();
    let table = Table::new(["symbol", "average_annual_dividend", "window", "years"]).with_rows(
        estimates.iter().map(|estimate| {
            let years = estimate
                .records
                .iter()
                .map(|record| record.year.to_string())
                .collect::<Vec<_>>()
                .join(",");
            vec![
                estimate.symbol.to_string(),
                estimate
                    .average_annual_dividend
                    .map(|average| average.round_dp(4).normalize().to_string())
                    .unwrap_or_else(|| "insufficient history".to_owned()),
                estimate.window.to_string(),
                years,
            ]
        }),
    );
    let data = serde_json::to_value(DividendResponseData { estimates })?;

    Ok(CommandResult {
        data,
        table,
        failures: report.failures,
        degraded: report.degraded,
    })
}
