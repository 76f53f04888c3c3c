use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::data_source::{
    CapabilitySet, DataSource, Endpoint, FetchError, SourceFuture, Universe,
};
use crate::http_client::HttpClient;
use crate::{DividendHistory, ProviderId, Quote, Symbol, UtcDateTime};

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_QUOTE_ASSET: &str = "USDT";

/// Binance error code for an unknown trading pair.
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Crypto spot prices from Binance, quoted against one stable asset.
///
/// The universe is every base asset with a `TRADING` pair against the
/// configured quote asset, so `BTC` is priced through `BTCUSDT`.
#[derive(Clone)]
pub struct BinanceAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    quote_asset: String,
    request_timeout: Duration,
}

impl BinanceAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(BINANCE_BASE_URL),
            quote_asset: String::from(DEFAULT_QUOTE_ASSET),
            request_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_quote_asset(mut self, quote_asset: impl AsRef<str>) -> Self {
        self.quote_asset = quote_asset.as_ref().trim().to_ascii_uppercase();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn quote_asset(&self) -> &str {
        &self.quote_asset
    }

    fn pair(&self, symbol: &Symbol) -> String {
        format!("{}{}", symbol.as_str(), self.quote_asset)
    }

    async fn get(&self, url: String) -> Result<String, FetchError> {
        let response =
            super::send(&self.http_client, ProviderId::Binance, url, self.request_timeout).await?;
        if response.is_success() {
            return Ok(response.body);
        }

        match serde_json::from_str::<BinanceErrorBody>(&response.body) {
            Ok(body) if body.code == INVALID_SYMBOL_CODE => Err(FetchError::not_found(format!(
                "binance does not list this pair: {}",
                body.msg
            ))),
            _ => Err(FetchError::from_status(ProviderId::Binance, response.status)),
        }
    }

    async fn fetch_universe(&self) -> Result<Universe, FetchError> {
        let body = self
            .get(format!("{}/api/v3/exchangeInfo", self.base_url))
            .await?;
        parse_exchange_info(&body, &self.quote_asset)
    }

    async fn fetch_quote(&self, symbol: Symbol) -> Result<Quote, FetchError> {
        let pair = self.pair(&symbol);
        let body = self
            .get(format!(
                "{}/api/v3/ticker/price?symbol={}",
                self.base_url,
                urlencoding::encode(&pair)
            ))
            .await?;
        let price = parse_ticker_price(&body, &pair)?;

        Quote::new(symbol, price, ProviderId::Binance, UtcDateTime::now())
            .map_err(|e| FetchError::malformed(e.to_string()))
    }
}

impl DataSource for BinanceAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Binance
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, true, false)
    }

    fn universe(&self) -> SourceFuture<'_, Universe> {
        Box::pin(self.fetch_universe())
    }

    fn quote(&self, symbol: Symbol) -> SourceFuture<'_, Quote> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn dividends(&self, _symbol: Symbol) -> SourceFuture<'_, DividendHistory> {
        Box::pin(async { Err(FetchError::unsupported(ProviderId::Binance, Endpoint::Dividends)) })
    }
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    status: String,
    base_asset: String,
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

fn parse_exchange_info(body: &str, quote_asset: &str) -> Result<Universe, FetchError> {
    let info: ExchangeInfo = serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("failed to parse binance exchange info: {e}")))?;

    let symbols = info
        .symbols
        .into_iter()
        .filter(|pair| pair.status == "TRADING" && pair.quote_asset.eq_ignore_ascii_case(quote_asset))
        .filter_map(|pair| match Symbol::parse(&pair.base_asset) {
            Ok(symbol) => Some(symbol),
            Err(error) => {
                debug!(base = %pair.base_asset, %error, "skipping unparsable binance base asset");
                None
            }
        });

    Ok(Universe::new(symbols))
}

fn parse_ticker_price(body: &str, expected_pair: &str) -> Result<Decimal, FetchError> {
    let ticker: TickerPrice = serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("failed to parse binance ticker: {e}")))?;

    if !ticker.symbol.eq_ignore_ascii_case(expected_pair) {
        return Err(FetchError::malformed(format!(
            "binance answered for '{}' instead of '{expected_pair}'",
            ticker.symbol
        )));
    }

    Decimal::from_str(ticker.price.trim()).map_err(|e| {
        FetchError::malformed(format!("binance price '{}' is not numeric: {e}", ticker.price))
    })
}
