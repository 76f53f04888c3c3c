pub mod alphavantage;
pub mod binance;
pub mod datahub;

pub use alphavantage::AlphaVantageAdapter;
pub use binance::BinanceAdapter;
pub use datahub::DatahubListingAdapter;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::data_source::FetchError;
use crate::http_client::{redact_api_key, HttpClient, HttpRequest, HttpResponse};
use crate::ProviderId;

/// Issues one GET and maps transport failures onto the fetch taxonomy.
///
/// Status handling is left to the caller because providers encode errors
/// differently in non-2xx bodies.
async fn send(
    http_client: &Arc<dyn HttpClient>,
    provider: ProviderId,
    url: String,
    timeout: Duration,
) -> Result<HttpResponse, FetchError> {
    debug!(%provider, url = %redact_api_key(&url), "outbound request");
    let request = HttpRequest::get(url).with_timeout(timeout);
    http_client
        .execute(request)
        .await
        .map_err(|error| FetchError::from_transport(provider, &error))
}

fn parse_json(provider: ProviderId, body: &str) -> Result<serde_json::Value, FetchError> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("failed to parse {provider} response: {e}")))
}
