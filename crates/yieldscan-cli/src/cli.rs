//! CLI argument definitions for yieldscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `price` | Latest price for symbols across markets |
//! | `dividends` | Trailing average annual dividend per symbol |
//! | `rank` | Fair value ranking for the given symbols |
//! | `rank-market` | Fair value ranking for a whole market universe |
//! | `universe` | List the symbols a market recognizes |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON configuration file |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `warn` | Log filter when `RUST_LOG` is unset |
//!
//! # Examples
//!
//! ```bash
//! yieldscan price BTC ETH AAPL
//! yieldscan rank KO PEP T --format table
//! yieldscan rank-market equity --limit 20 --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Quote aggregation and dividend valuation across crypto and equity sources.
#[derive(Debug, Parser)]
#[command(
    name = "yieldscan",
    author,
    version,
    about = "Quote aggregation and dividend valuation CLI"
)]
pub struct Cli {
    /// JSON configuration file layered over built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON envelope.
    Json,
    /// Plain-text table for terminal display.
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarketArg {
    Crypto,
    Equity,
}

impl From<MarketArg> for yieldscan_core::Market {
    fn from(value: MarketArg) -> Self {
        match value {
            MarketArg::Crypto => Self::Crypto,
            MarketArg::Equity => Self::Equity,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the latest price for one or more symbols.
    ///
    ///   yieldscan price BTC ETH AAPL
    Price(SymbolsArgs),

    /// Estimate the trailing average annual dividend for equities.
    ///
    ///   yieldscan dividends KO PEP
    Dividends(SymbolsArgs),

    /// Rank symbols by market price against dividend fair value.
    ///
    ///   yieldscan rank KO PEP T
    Rank(SymbolsArgs),

    /// Rank every symbol in a market's universe.
    ///
    ///   yieldscan rank-market equity --limit 25
    RankMarket(RankMarketArgs),

    /// List the symbols a market recognizes.
    ///
    ///   yieldscan universe crypto
    Universe(UniverseArgs),
}

#[derive(Debug, Args)]
pub struct SymbolsArgs {
    /// One or more symbols (e.g., BTC, AAPL, KO).
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RankMarketArgs {
    #[arg(value_enum)]
    pub market: MarketArg,

    /// Keep only the first N results.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct UniverseArgs {
    #[arg(value_enum)]
    pub market: MarketArg,
}
