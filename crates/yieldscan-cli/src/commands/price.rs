use serde::Serialize;
use yieldscan_core::{Aggregator, Quote};

use crate::cli::SymbolsArgs;
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct PriceResponseData<'a> {
    quotes: Vec<&'a Quote>,
}

pub async fn run(args: &SymbolsArgs, aggregator: &Aggregator) -> Result<CommandResult, CliError> {
    let report = aggregator.quotes(args.symbols.as_slice()).await?;

    let quotes: Vec<&Quote> = report.quotes.values().collect();
    let table = Table::new(["symbol", "price", "source", "fetched_at"]).with_rows(
        quotes.iter().map(|quote| {
            vec![
                quote.symbol.to_string(),
                quote.price.normalize().to_string(),
                quote.source.to_string(),
                quote.fetched_at.to_string(),
            ]
        }),
    );
    let data = serde_json::to_value(PriceResponseData { quotes })?;

    Ok(CommandResult {
        data,
        table,
        failures: report.failures,
        degraded: report.degraded,
    })
}
