use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use time::{Date, Month};

use crate::data_source::{
    CapabilitySet, DataSource, Endpoint, FetchError, FetchErrorKind, SourceFuture, Universe,
};
use crate::http_client::HttpClient;
use crate::{DividendEntry, DividendHistory, ProviderId, Quote, Symbol, UtcDateTime};

pub const ALPHAVANTAGE_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Equity quotes (`GLOBAL_QUOTE`) and dividend history
/// (`TIME_SERIES_MONTHLY_ADJUSTED`) from Alpha Vantage.
///
/// Alpha Vantage is queried by symbol and has no fixed universe.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
}

impl Debug for AlphaVantageAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageAdapter")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: String::from(ALPHAVANTAGE_BASE_URL),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, function: &str, symbol: &Symbol) -> String {
        format!(
            "{}?function={function}&symbol={}&apikey={}",
            self.base_url,
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(&self.api_key)
        )
    }

    async fn get_json(&self, url: String) -> Result<Value, FetchError> {
        let response = super::send(
            &self.http_client,
            ProviderId::Alphavantage,
            url,
            self.request_timeout,
        )
        .await?;

        if !response.is_success() {
            return Err(FetchError::from_status(
                ProviderId::Alphavantage,
                response.status,
            ));
        }

        let payload = super::parse_json(ProviderId::Alphavantage, &response.body)?;
        check_notices(&payload)?;
        Ok(payload)
    }

    async fn fetch_quote(&self, symbol: Symbol) -> Result<Quote, FetchError> {
        let payload = self.get_json(self.endpoint("GLOBAL_QUOTE", &symbol)).await?;
        let price = parse_global_quote(payload, &symbol)?;

        Quote::new(symbol, price, ProviderId::Alphavantage, UtcDateTime::now())
            .map_err(|e| FetchError::malformed(e.to_string()))
    }

    async fn fetch_dividends(&self, symbol: Symbol) -> Result<DividendHistory, FetchError> {
        let payload = self
            .get_json(self.endpoint("TIME_SERIES_MONTHLY_ADJUSTED", &symbol))
            .await?;
        let entries = parse_monthly_adjusted(payload, &symbol)?;

        Ok(DividendHistory {
            symbol,
            source: ProviderId::Alphavantage,
            fetched_at: UtcDateTime::now(),
            entries,
        })
    }
}

impl DataSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(false, true, true)
    }

    fn universe(&self) -> SourceFuture<'_, Universe> {
        Box::pin(async {
            Err(FetchError::unsupported(
                ProviderId::Alphavantage,
                Endpoint::Universe,
            ))
        })
    }

    fn quote(&self, symbol: Symbol) -> SourceFuture<'_, Quote> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn dividends(&self, symbol: Symbol) -> SourceFuture<'_, DividendHistory> {
        Box::pin(self.fetch_dividends(symbol))
    }
}

/// Alpha Vantage reports throttling, key refusals and bad symbols with HTTP
/// 200 and a top-level notice instead of data.
fn check_notices(payload: &Value) -> Result<(), FetchError> {
    for key in ["Note", "Information"] {
        if let Some(notice) = payload.get(key).and_then(Value::as_str) {
            return Err(classify_notice(notice));
        }
    }

    if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
        return Err(FetchError::not_found(format!(
            "alphavantage rejected the symbol: {message}"
        )));
    }

    Ok(())
}

/// Key refusals (invalid, missing or demo key) and premium-only endpoints do
/// not clear on retry; anything else is treated as throttling.
fn classify_notice(notice: &str) -> FetchError {
    let lower = notice.to_ascii_lowercase();
    let throttled = lower.contains("rate limit") || lower.contains("call frequency");
    let refused = lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("premium endpoint");

    if refused && !throttled {
        FetchError::new(
            FetchErrorKind::Unsupported,
            format!("alphavantage refused the request: {notice}"),
        )
    } else {
        FetchError::rate_limited(format!("alphavantage throttled the request: {notice}"))
    }
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    quote: Option<BTreeMap<String, String>>,
}

fn parse_global_quote(payload: Value, symbol: &Symbol) -> Result<Decimal, FetchError> {
    let response: GlobalQuoteResponse = serde_json::from_value(payload)
        .map_err(|e| FetchError::malformed(format!("unexpected alphavantage quote shape: {e}")))?;

    let fields = response
        .quote
        .ok_or_else(|| FetchError::malformed("alphavantage response has no 'Global Quote'"))?;
    if fields.is_empty() {
        return Err(FetchError::not_found(format!(
            "alphavantage has no quote for '{symbol}'"
        )));
    }

    if let Some(reported) = fields.get("01. symbol") {
        if !reported.eq_ignore_ascii_case(symbol.as_str()) {
            return Err(FetchError::malformed(format!(
                "alphavantage answered for '{reported}' instead of '{symbol}'"
            )));
        }
    }

    let raw_price = fields
        .get("05. price")
        .ok_or_else(|| FetchError::malformed("alphavantage quote is missing '05. price'"))?;
    parse_decimal("price", raw_price)
}

#[derive(Debug, Deserialize)]
struct MonthlyAdjustedResponse {
    #[serde(rename = "Meta Data")]
    meta: Option<BTreeMap<String, String>>,
    #[serde(rename = "Monthly Adjusted Time Series")]
    series: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

fn parse_monthly_adjusted(payload: Value, symbol: &Symbol) -> Result<Vec<DividendEntry>, FetchError> {
    let response: MonthlyAdjustedResponse = serde_json::from_value(payload).map_err(|e| {
        FetchError::malformed(format!("unexpected alphavantage time series shape: {e}"))
    })?;

    if let Some(reported) = response.meta.as_ref().and_then(|meta| meta.get("2. Symbol")) {
        if !reported.eq_ignore_ascii_case(symbol.as_str()) {
            return Err(FetchError::malformed(format!(
                "alphavantage answered for '{reported}' instead of '{symbol}'"
            )));
        }
    }

    let series = response.series.ok_or_else(|| {
        FetchError::malformed("alphavantage response has no 'Monthly Adjusted Time Series'")
    })?;

    // BTreeMap over ISO dates keeps entries in ascending date order.
    series
        .iter()
        .map(|(raw_date, fields)| {
            let date = parse_iso_date(raw_date)?;
            let raw_amount = fields.get("7. dividend amount").ok_or_else(|| {
                FetchError::malformed(format!("entry {raw_date} is missing '7. dividend amount'"))
            })?;
            let amount = parse_decimal("dividend amount", raw_amount)?;
            DividendEntry::new(date, amount).map_err(|e| FetchError::malformed(e.to_string()))
        })
        .collect()
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, FetchError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| FetchError::malformed(format!("{field} '{raw}' is not numeric: {e}")))
}

fn parse_iso_date(raw: &str) -> Result<Date, FetchError> {
    let malformed = || FetchError::malformed(format!("'{raw}' is not a YYYY-MM-DD date"));

    let mut parts = raw.trim().splitn(3, '-');
    let (Some(year), Some(month), Some(day)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let year: i32 = year.parse().map_err(|_| malformed())?;
    let month: u8 = month.parse().map_err(|_| malformed())?;
    let day: u8 = day.parse().map_err(|_| malformed())?;
    let month = Month::try_from(month).map_err(|_| malformed())?;

    Date::from_calendar_date(year, month, day).map_err(|_| malformed())
}
