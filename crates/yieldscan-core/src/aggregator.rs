//! Orchestrates classification, batch fetches, estimation and valuation.
//!
//! The [`Aggregator`] owns one [`BatchFetcher`] per provider and the source
//! wiring for each market. Universes are rebuilt on every call; nothing is
//! cached between requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{join, join_all};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapters::{AlphaVantageAdapter, BinanceAdapter, DatahubListingAdapter};
use crate::batch::{BatchFetcher, BatchOutcome};
use crate::classifier::{classify, Classification};
use crate::config::AggregatorConfig;
use crate::data_source::{DataSource, Endpoint, FetchError, FetchErrorKind, Universe};
use crate::dividend::{estimate, DividendWindow};
use crate::domain::{DividendHistory, Quote, ValuationResult, YieldEstimate};
use crate::http_client::HttpClient;
use crate::valuation::valuate;
use crate::{CoreError, Market, ProviderId, Symbol, UtcDateTime};

/// Key used when no Alpha Vantage key is configured; the provider throttles
/// it heavily and only serves a handful of symbols.
const DEMO_API_KEY: &str = "demo";

/// Sources consulted for one market.
#[derive(Clone)]
pub struct MarketSources {
    /// Union of these universes is the market's universe.
    pub universe: Vec<Arc<dyn DataSource>>,
    pub quotes: Arc<dyn DataSource>,
    /// `None` when the market has no dividend history provider.
    pub dividends: Option<Arc<dyn DataSource>>,
}

/// Failure attached to one requested symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolFailure {
    /// Requested text, kept verbatim when it could not be parsed.
    pub symbol: String,
    pub market: Option<Market>,
    pub endpoint: Option<Endpoint>,
    #[serde(flatten)]
    pub error: FetchError,
}

impl SymbolFailure {
    fn unrecognized(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            market: None,
            endpoint: None,
            error: FetchError::unrecognized(message),
        }
    }

    fn fetch(symbol: &Symbol, market: Market, endpoint: Endpoint, error: FetchError) -> Self {
        Self {
            symbol: symbol.to_string(),
            market: Some(market),
            endpoint: Some(endpoint),
            error,
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.error.kind()
    }
}

/// Why part of a result may be incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DegradationReason {
    UniverseUnavailable { kind: FetchErrorKind, message: String },
    DeadlineExceeded { pending: usize },
}

/// Batch-level problem reported alongside partial data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub provider: ProviderId,
    pub market: Market,
    pub endpoint: Endpoint,
    #[serde(flatten)]
    pub reason: DegradationReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UniverseSnapshot {
    pub universes: BTreeMap<Market, Universe>,
    pub degraded: Vec<Degradation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UniverseReport {
    pub market: Market,
    pub symbols: Vec<Symbol>,
    pub degraded: Vec<Degradation>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QuoteReport {
    pub quotes: BTreeMap<Symbol, Quote>,
    pub failures: Vec<SymbolFailure>,
    pub degraded: Vec<Degradation>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct YieldReport {
    pub estimates: BTreeMap<Symbol, YieldEstimate>,
    pub failures: Vec<SymbolFailure>,
    pub degraded: Vec<Degradation>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RankingReport {
    pub valuations: Vec<ValuationResult>,
    pub failures: Vec<SymbolFailure>,
    pub degraded: Vec<Degradation>,
}

/// Failures and degradations gathered while merging batch outcomes.
#[derive(Default)]
struct Diagnostics {
    failures: Vec<SymbolFailure>,
    degraded: Vec<Degradation>,
}

impl Diagnostics {
    fn absorb<T>(
        &mut self,
        market: Market,
        endpoint: Endpoint,
        provider: ProviderId,
        outcome: BatchOutcome<T>,
    ) -> BTreeMap<Symbol, T> {
        if outcome.deadline_exceeded {
            self.degraded.push(Degradation {
                provider,
                market,
                endpoint,
                reason: DegradationReason::DeadlineExceeded {
                    pending: outcome.pending,
                },
            });
        }

        self.failures.extend(
            outcome
                .failures
                .into_iter()
                .map(|(symbol, error)| SymbolFailure::fetch(&symbol, market, endpoint, error)),
        );
        outcome.values
    }

    fn reject_all(&mut self, market: Market, endpoint: Endpoint, symbols: &[Symbol], error: &FetchError) {
        self.failures.extend(
            symbols
                .iter()
                .map(|symbol| SymbolFailure::fetch(symbol, market, endpoint, error.clone())),
        );
    }

    fn merge(&mut self, other: Diagnostics) {
        self.failures.extend(other.failures);
        self.degraded.extend(other.degraded);
    }
}

/// Input symbols resolved to markets.
struct Plan {
    classification: Classification,
    diagnostics: Diagnostics,
}

/// Quotes and estimates collected for one market.
#[derive(Default)]
struct MarketData {
    markets: BTreeMap<Symbol, Market>,
    quotes: BTreeMap<Symbol, Quote>,
    estimates: BTreeMap<Symbol, YieldEstimate>,
    diagnostics: Diagnostics,
}

/// Builder wiring markets to sources.
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    markets: BTreeMap<Market, MarketSources>,
    as_of_year: Option<i32>,
}

impl AggregatorBuilder {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            markets: BTreeMap::new(),
            as_of_year: None,
        }
    }

    pub fn market(mut self, market: Market, sources: MarketSources) -> Self {
        self.markets.insert(market, sources);
        self
    }

    /// Pins the year dividend windows are measured from. Defaults to the
    /// current UTC year at call time.
    pub fn as_of_year(mut self, year: i32) -> Self {
        self.as_of_year = Some(year);
        self
    }

    pub fn build(self) -> Result<Aggregator, CoreError> {
        self.config.validate()?;

        let mut fetchers = BTreeMap::new();
        for provider in ProviderId::ALL {
            fetchers.insert(provider, BatchFetcher::new(self.config.policy(provider))?);
        }

        Ok(Aggregator {
            markets: self.markets,
            fetchers,
            target_yield_rate: self.config.target_yield_rate,
            dividend_window: self.config.dividend_window,
            as_of_year: self.as_of_year,
        })
    }
}

/// Entry point for quote, dividend and ranking requests.
pub struct Aggregator {
    markets: BTreeMap<Market, MarketSources>,
    fetchers: BTreeMap<ProviderId, BatchFetcher>,
    target_yield_rate: Decimal,
    dividend_window: DividendWindow,
    as_of_year: Option<i32>,
}

impl Aggregator {
    pub fn builder(config: AggregatorConfig) -> AggregatorBuilder {
        AggregatorBuilder::new(config)
    }

    /// Wires the production providers: Binance for crypto; Datahub listings
    /// plus Alpha Vantage for equities.
    pub fn from_config(
        config: AggregatorConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, CoreError> {
        let binance_timeout = config.policy(ProviderId::Binance).request_timeout;
        let alphavantage_timeout = config.policy(ProviderId::Alphavantage).request_timeout;
        let datahub_timeout = config.policy(ProviderId::Datahub).request_timeout;

        let binance: Arc<dyn DataSource> = Arc::new(
            BinanceAdapter::new(Arc::clone(&http_client))
                .with_quote_asset(&config.crypto_quote_asset)
                .with_request_timeout(binance_timeout),
        );

        let api_key = match config.alphavantage_api_key.as_deref() {
            Some(key) => key.to_owned(),
            None => {
                warn!("no Alpha Vantage API key configured; using the demo key");
                DEMO_API_KEY.to_owned()
            }
        };
        let alphavantage: Arc<dyn DataSource> = Arc::new(
            AlphaVantageAdapter::new(Arc::clone(&http_client), api_key)
                .with_request_timeout(alphavantage_timeout),
        );

        let nasdaq: Arc<dyn DataSource> = Arc::new(
            DatahubListingAdapter::nasdaq(Arc::clone(&http_client))
                .with_request_timeout(datahub_timeout),
        );
        let nyse: Arc<dyn DataSource> = Arc::new(
            DatahubListingAdapter::nyse(http_client).with_request_timeout(datahub_timeout),
        );

        Self::builder(config)
            .market(
                Market::Crypto,
                MarketSources {
                    universe: vec![Arc::clone(&binance)],
                    quotes: binance,
                    dividends: None,
                },
            )
            .market(
                Market::Equity,
                MarketSources {
                    universe: vec![nasdaq, nyse],
                    quotes: Arc::clone(&alphavantage),
                    dividends: Some(alphavantage),
                },
            )
            .build()
    }

    pub fn target_yield_rate(&self) -> Decimal {
        self.target_yield_rate
    }

    /// Fetches every market's universe concurrently.
    ///
    /// Markets whose every universe source fails are left out and reported
    /// as degraded. Fails only when no market could be resolved.
    pub async fn universes(&self) -> Result<UniverseSnapshot, CoreError> {
        let fetches = self
            .markets
            .keys()
            .map(|market| async move { (*market, self.market_universe(*market).await) });

        let mut snapshot = UniverseSnapshot::default();
        for (market, (universe, degraded)) in join_all(fetches).await {
            snapshot.degraded.extend(degraded);
            if let Some(universe) = universe {
                snapshot.universes.insert(market, universe);
            }
        }

        if snapshot.universes.is_empty() {
            return Err(all_unavailable(&snapshot.degraded));
        }
        Ok(snapshot)
    }

    /// Lists one market's universe, sorted.
    pub async fn universe(&self, market: Market) -> Result<UniverseReport, CoreError> {
        let (universe, degraded) = self.market_universe(market).await;
        match universe {
            Some(universe) => Ok(UniverseReport {
                market,
                symbols: universe.symbols.into_iter().collect(),
                degraded,
            }),
            None => Err(all_unavailable(&degraded)),
        }
    }

    pub async fn quotes<S: AsRef<str>>(&self, symbols: &[S]) -> Result<QuoteReport, CoreError> {
        let Some(mut plan) = self.plan(symbols).await? else {
            return Ok(QuoteReport::default());
        };

        let batches = plan
            .classification
            .assignments
            .iter()
            .map(|(market, symbols)| self.market_quotes(*market, symbols));

        let mut report = QuoteReport::default();
        for (quotes, diagnostics) in join_all(batches).await {
            report.quotes.extend(quotes);
            plan.diagnostics.merge(diagnostics);
        }

        report.failures = plan.diagnostics.failures;
        report.degraded = plan.diagnostics.degraded;
        Ok(report)
    }

    pub async fn dividends<S: AsRef<str>>(&self, symbols: &[S]) -> Result<YieldReport, CoreError> {
        let Some(mut plan) = self.plan(symbols).await? else {
            return Ok(YieldReport::default());
        };

        let batches = plan
            .classification
            .assignments
            .iter()
            .map(|(market, symbols)| self.market_estimates(*market, symbols));

        let mut report = YieldReport::default();
        for (estimates, diagnostics) in join_all(batches).await {
            report.estimates.extend(estimates);
            plan.diagnostics.merge(diagnostics);
        }

        report.failures = plan.diagnostics.failures;
        report.degraded = plan.diagnostics.degraded;
        Ok(report)
    }

    /// Values the requested symbols, most undervalued first.
    pub async fn rank<S: AsRef<str>>(&self, symbols: &[S]) -> Result<RankingReport, CoreError> {
        let Some(mut plan) = self.plan(symbols).await? else {
            return Ok(RankingReport::default());
        };

        let markets = plan
            .classification
            .assignments
            .iter()
            .map(|(market, symbols)| self.market_data(*market, symbols));

        let mut merged = MarketData::default();
        for data in join_all(markets).await {
            merged.markets.extend(data.markets);
            merged.quotes.extend(data.quotes);
            merged.estimates.extend(data.estimates);
            plan.diagnostics.merge(data.diagnostics);
        }
        merged.diagnostics = plan.diagnostics;

        self.finish_ranking(merged)
    }

    /// Values a market's whole universe.
    pub async fn rank_market(
        &self,
        market: Market,
        limit: Option<usize>,
    ) -> Result<RankingReport, CoreError> {
        let (universe, degraded) = self.market_universe(market).await;
        let Some(universe) = universe else {
            return Err(all_unavailable(&degraded));
        };

        let symbols: Vec<Symbol> = universe.symbols.into_iter().collect();
        info!(%market, symbols = symbols.len(), "ranking market universe");

        let mut data = self.market_data(market, &symbols).await;
        data.diagnostics.degraded.extend(degraded);

        let mut report = self.finish_ranking(data)?;
        if let Some(limit) = limit {
            report.valuations.truncate(limit);
        }
        Ok(report)
    }

    fn finish_ranking(&self, data: MarketData) -> Result<RankingReport, CoreError> {
        let valuation = valuate(&data.quotes, &data.estimates, self.target_yield_rate)?;
        let mut failures = data.diagnostics.failures;
        failures.extend(valuation.rejected.into_iter().map(|(symbol, error)| {
            let market = data.markets.get(&symbol).copied();
            SymbolFailure {
                symbol: symbol.as_str().to_owned(),
                market,
                endpoint: None,
                error,
            }
        }));
        info!(
            valued = valuation.ranked.len(),
            failures = failures.len(),
            "ranking finished"
        );

        Ok(RankingReport {
            valuations: valuation.ranked,
            failures,
            degraded: data.diagnostics.degraded,
        })
    }

    /// Parses inputs and classifies them against fresh universes.
    ///
    /// Returns `None` for empty input so no request is issued.
    async fn plan<S: AsRef<str>>(&self, inputs: &[S]) -> Result<Option<Plan>, CoreError> {
        if inputs.is_empty() {
            return Ok(None);
        }

        let mut diagnostics = Diagnostics::default();
        let mut symbols = Vec::with_capacity(inputs.len());
        for input in inputs {
            let raw = input.as_ref();
            match Symbol::parse(raw) {
                Ok(symbol) => symbols.push(symbol),
                Err(error) => diagnostics
                    .failures
                    .push(SymbolFailure::unrecognized(raw.trim(), error.to_string())),
            }
        }

        if symbols.is_empty() {
            return Ok(Some(Plan {
                classification: Classification::default(),
                diagnostics,
            }));
        }

        let snapshot = self.universes().await?;
        diagnostics.degraded.extend(snapshot.degraded);

        let classification = classify(&symbols, &snapshot.universes);
        diagnostics.failures.extend(classification.unrecognized.iter().map(|symbol| {
            SymbolFailure::unrecognized(symbol.as_str(), "symbol matched no known source universe")
        }));

        Ok(Some(Plan {
            classification,
            diagnostics,
        }))
    }

    async fn market_universe(&self, market: Market) -> (Option<Universe>, Vec<Degradation>) {
        let Some(sources) = self.markets.get(&market) else {
            return (None, Vec::new());
        };

        let fetches = sources.universe.iter().map(|source| async move {
            let provider = source.id();
            let result = match self.fetcher(provider, Endpoint::Universe) {
                Ok(fetcher) => {
                    fetcher
                        .fetch_one(&format!("{market} universe"), || source.universe())
                        .await
                }
                Err(error) => Err(error),
            };
            (provider, result)
        });

        let mut merged: Option<Universe> = None;
        let mut degraded = Vec::new();
        for (provider, result) in join_all(fetches).await {
            match result {
                Ok(universe) => {
                    info!(%market, %provider, symbols = universe.len(), "universe loaded");
                    merged
                        .get_or_insert_with(Universe::default)
                        .symbols
                        .extend(universe.symbols);
                }
                Err(error) => {
                    warn!(%market, %provider, error = %error, "universe unavailable");
                    degraded.push(Degradation {
                        provider,
                        market,
                        endpoint: Endpoint::Universe,
                        reason: DegradationReason::UniverseUnavailable {
                            kind: error.kind(),
                            message: error.message().to_owned(),
                        },
                    });
                }
            }
        }

        (merged, degraded)
    }

    async fn market_quotes(
        &self,
        market: Market,
        symbols: &[Symbol],
    ) -> (BTreeMap<Symbol, Quote>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let quotes = match self.quote_batch(market, symbols).await {
            Ok((provider, outcome)) => diagnostics.absorb(market, Endpoint::Quote, provider, outcome),
            Err(error) => {
                diagnostics.reject_all(market, Endpoint::Quote, symbols, &error);
                BTreeMap::new()
            }
        };
        (quotes, diagnostics)
    }

    async fn market_estimates(
        &self,
        market: Market,
        symbols: &[Symbol],
    ) -> (BTreeMap<Symbol, YieldEstimate>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let estimates = match self.dividend_batch(market, symbols).await {
            Ok((provider, outcome)) => {
                let histories = diagnostics.absorb(market, Endpoint::Dividends, provider, outcome);
                self.estimate_all(market, histories, &mut diagnostics)
            }
            Err(error) => {
                diagnostics.reject_all(market, Endpoint::Dividends, symbols, &error);
                BTreeMap::new()
            }
        };
        (estimates, diagnostics)
    }

    /// Runs the quote and dividend batches for one market in parallel.
    ///
    /// Estimates short of the dividend window become `InsufficientHistory`
    /// failures and are left out of `estimates`.
    ///
    /// A market without a dividend source cannot be valued, so its symbols
    /// are rejected up front and no quote is requested.
    async fn market_data(&self, market: Market, symbols: &[Symbol]) -> MarketData {
        if let Err(error) = self.source(market, Endpoint::Dividends) {
            debug!(%market, symbols = symbols.len(), "market has no dividend source; skipping quotes");
            let mut diagnostics = Diagnostics::default();
            diagnostics.reject_all(market, Endpoint::Dividends, symbols, &error);
            return MarketData {
                diagnostics,
                ..MarketData::default()
            };
        }

        let ((quotes, quote_diagnostics), (estimates, dividend_diagnostics)) = join(
            self.market_quotes(market, symbols),
            self.market_estimates(market, symbols),
        )
        .await;

        let mut diagnostics = quote_diagnostics;
        diagnostics.merge(dividend_diagnostics);

        let (estimates, insufficient): (BTreeMap<_, _>, BTreeMap<_, _>) = estimates
            .into_iter()
            .partition(|(_, estimate)| estimate.is_sufficient());
        diagnostics
            .failures
            .extend(insufficient.into_iter().map(|(symbol, estimate)| {
                let error = FetchError::new(
                    FetchErrorKind::InsufficientHistory,
                    format!(
                        "dividend history covers {} of {} required years",
                        estimate.records.len(),
                        estimate.window
                    ),
                );
                SymbolFailure::fetch(&symbol, market, Endpoint::Dividends, error)
            }));

        MarketData {
            markets: symbols.iter().map(|symbol| (symbol.clone(), market)).collect(),
            quotes,
            estimates,
            diagnostics,
        }
    }

    async fn quote_batch(
        &self,
        market: Market,
        symbols: &[Symbol],
    ) -> Result<(ProviderId, BatchOutcome<Quote>), FetchError> {
        let source = self.source(market, Endpoint::Quote)?;
        let provider = source.id();
        let fetcher = self.fetcher(provider, Endpoint::Quote)?;
        Ok((provider, fetcher.fetch_quotes(source, symbols).await))
    }

    async fn dividend_batch(
        &self,
        market: Market,
        symbols: &[Symbol],
    ) -> Result<(ProviderId, BatchOutcome<DividendHistory>), FetchError> {
        let source = self.source(market, Endpoint::Dividends)?;
        let provider = source.id();
        let fetcher = self.fetcher(provider, Endpoint::Dividends)?;
        Ok((provider, fetcher.fetch_dividends(source, symbols).await))
    }

    fn source(&self, market: Market, endpoint: Endpoint) -> Result<Arc<dyn DataSource>, FetchError> {
        let sources = self.markets.get(&market).ok_or_else(|| {
            FetchError::new(
                FetchErrorKind::Unsupported,
                format!("no sources configured for market '{market}'"),
            )
        })?;

        let source = match endpoint {
            Endpoint::Quote => Some(&sources.quotes),
            Endpoint::Dividends => sources.dividends.as_ref(),
            Endpoint::Universe => sources.universe.first(),
        };

        match source {
            Some(source) if source.capabilities().supports(endpoint) => Ok(Arc::clone(source)),
            Some(source) => Err(FetchError::unsupported(source.id(), endpoint)),
            None => Err(FetchError::new(
                FetchErrorKind::Unsupported,
                format!("market '{market}' has no {endpoint} source"),
            )),
        }
    }

    fn fetcher(&self, provider: ProviderId, endpoint: Endpoint) -> Result<&BatchFetcher, FetchError> {
        self.fetchers
            .get(&provider)
            .ok_or_else(|| FetchError::unsupported(provider, endpoint))
    }

    /// Estimates every history; arithmetic overflow rejects the symbol as
    /// `Malformed`.
    fn estimate_all(
        &self,
        market: Market,
        histories: BTreeMap<Symbol, DividendHistory>,
        diagnostics: &mut Diagnostics,
    ) -> BTreeMap<Symbol, YieldEstimate> {
        let as_of_year = self.as_of_year.unwrap_or_else(|| UtcDateTime::now().year());
        let mut estimates = BTreeMap::new();
        for (symbol, history) in histories {
            match estimate(&history, self.dividend_window, as_of_year) {
                Ok(estimate) => {
                    estimates.insert(symbol, estimate);
                }
                Err(error) => {
                    debug!(%market, %symbol, error = %error, "dividend estimate rejected");
                    diagnostics
                        .failures
                        .push(SymbolFailure::fetch(&symbol, market, Endpoint::Dividends, error));
                }
            }
        }
        estimates
    }
}

fn all_unavailable(degraded: &[Degradation]) -> CoreError {
    let mut reasons: Vec<String> = degraded
        .iter()
        .filter_map(|degradation| match &degradation.reason {
            DegradationReason::UniverseUnavailable { message, .. } => Some(format!(
                "{} {} universe: {message}",
                degradation.provider, degradation.market
            )),
            DegradationReason::DeadlineExceeded { .. } => None,
        })
        .collect();
    if reasons.is_empty() {
        reasons.push("no market sources configured".to_owned());
    }
    CoreError::AllSourcesUnavailable { reasons }
}
