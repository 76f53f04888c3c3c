use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::data_source::{
    CapabilitySet, DataSource, Endpoint, FetchError, SourceFuture, Universe,
};
use crate::http_client::HttpClient;
use crate::{DividendHistory, ProviderId, Quote, Symbol};

pub const NASDAQ_LISTINGS_URL: &str = "https://datahub.io/core/nasdaq-listings/r/1.csv";
pub const NYSE_LISTINGS_URL: &str = "https://datahub.io/core/nyse-other-listings/r/1.csv";

/// Equity listing roster published as a CSV snapshot on datahub.io.
///
/// Each adapter reads one listing; an exchange universe spanning several
/// listings is the union of several adapters.
#[derive(Clone)]
pub struct DatahubListingAdapter {
    http_client: Arc<dyn HttpClient>,
    url: String,
    symbol_column: String,
    request_timeout: Duration,
}

impl DatahubListingAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        url: impl Into<String>,
        symbol_column: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            url: url.into(),
            symbol_column: symbol_column.into(),
            request_timeout: Duration::from_secs(20),
        }
    }

    /// NASDAQ-listed securities.
    pub fn nasdaq(http_client: Arc<dyn HttpClient>) -> Self {
        Self::new(http_client, NASDAQ_LISTINGS_URL, "Symbol")
    }

    /// NYSE and other non-NASDAQ listings.
    pub fn nyse(http_client: Arc<dyn HttpClient>) -> Self {
        Self::new(http_client, NYSE_LISTINGS_URL, "ACT Symbol")
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn fetch_universe(&self) -> Result<Universe, FetchError> {
        let response = super::send(
            &self.http_client,
            ProviderId::Datahub,
            self.url.clone(),
            self.request_timeout,
        )
        .await?;

        if !response.is_success() {
            return Err(FetchError::from_status(ProviderId::Datahub, response.status));
        }

        parse_listing_csv(&response.body, &self.symbol_column)
    }
}

impl DataSource for DatahubListingAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Datahub
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, false, false)
    }

    fn universe(&self) -> SourceFuture<'_, Universe> {
        Box::pin(self.fetch_universe())
    }

    fn quote(&self, _symbol: Symbol) -> SourceFuture<'_, Quote> {
        Box::pin(async { Err(FetchError::unsupported(ProviderId::Datahub, Endpoint::Quote)) })
    }

    fn dividends(&self, _symbol: Symbol) -> SourceFuture<'_, DividendHistory> {
        Box::pin(async {
            Err(FetchError::unsupported(
                ProviderId::Datahub,
                Endpoint::Dividends,
            ))
        })
    }
}

fn parse_listing_csv(body: &str, symbol_column: &str) -> Result<Universe, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| FetchError::malformed(format!("unreadable listing header: {e}")))?;
    let column = headers
        .iter()
        .position(|header| header == symbol_column)
        .ok_or_else(|| {
            FetchError::malformed(format!("listing has no '{symbol_column}' column"))
        })?;

    let mut symbols = Vec::new();
    let mut skipped = 0_usize;
    for record in reader.records() {
        let record =
            record.map_err(|e| FetchError::malformed(format!("unreadable listing row: {e}")))?;
        match record.get(column).map(Symbol::parse) {
            Some(Ok(symbol)) => symbols.push(symbol),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, column = symbol_column, "skipped listing rows without a usable symbol");
    }

    Ok(Universe::new(symbols))
}
