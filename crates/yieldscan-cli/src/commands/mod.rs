mod dividends;
mod price;
mod rank;
mod universe;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;
use yieldscan_core::{Aggregator, AggregatorConfig, Degradation, ReqwestHttpClient, SymbolFailure};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{Envelope, Table};

pub struct CommandResult {
    pub data: Value,
    pub table: Table,
    pub failures: Vec<SymbolFailure>,
    pub degraded: Vec<Degradation>,
}

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let started = Instant::now();

    let config = AggregatorConfig::load(cli.config.as_deref())?;
    debug!(?config, "configuration loaded");
    let aggregator = Aggregator::from_config(config, Arc::new(ReqwestHttpClient::new()))?;

    let result = match &cli.command {
        Command::Price(args) => price::run(args, &aggregator).await?,
        Command::Dividends(args) => dividends::run(args, &aggregator).await?,
        Command::Rank(args) => rank::run(args, &aggregator).await?,
        Command::RankMarket(args) => rank::run_market(args, &aggregator).await?,
        Command::Universe(args) => universe::run(args, &aggregator).await?,
    };

    Ok(Envelope::new(result, started.elapsed()))
}
