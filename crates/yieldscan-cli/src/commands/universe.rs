use yieldscan_core::Aggregator;

use crate::cli::UniverseArgs;
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

pub async fn run(args: &UniverseArgs, aggregator: &Aggregator) -> Result<CommandResult, CliError> {
    let report = aggregator.universe(args.market.into()).await?;

    let table = Table::new(["symbol"])
        .with_rows(report.symbols.iter().map(|symbol| vec![symbol.to_string()]));
    let data = serde_json::json!({
        "market": report.market,
        "count": report.symbols.len(),
        "symbols": report.symbols,
    });

    Ok(CommandResult {
        data,
        table,
        failures: Vec::new(),
        degraded: report.degraded,
    })
}
