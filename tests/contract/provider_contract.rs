#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use rust_decimal_macros::dec;
use yieldscan_core::{
    AlphaVantageAdapter, BinanceAdapter, DataSource, DatahubListingAdapter, Endpoint,
    FetchErrorKind, HttpClient, HttpError, HttpResponse, ProviderId,
};

use support::{symbol, ScriptedHttpClient};

const BTC_TICKER: &str = r#"{"symbol":"BTCUSDT","price":"64000.50000000"}"#;
const KO_QUOTE: &str = r#"{"Global Quote": {"01. symbol": "KO", "05. price": "61.2000"}}"#;
const KO_MONTHLY: &str = r#"{
    "Meta Data": {"2. Symbol": "KO"},
    "Monthly Adjusted Time Series": {
        "2023-11-30": {"7. dividend amount": "0.4600"},
        "2023-09-29": {"7. dividend amount": "0.4600"},
        "2022-11-30": {"7. dividend amount": "0.4400"},
        "2022-10-31": {"7. dividend amount": "0.0000"}
    }
}"#;
const NASDAQ_CSV: &str = "Symbol,Company Name\nAAPL,Apple Inc.\nMSFT,Microsoft Corporation\n";

struct ProviderCase {
    id: ProviderId,
    source: Arc<dyn DataSource>,
    supports_universe: bool,
    supports_quote: bool,
    supports_dividends: bool,
}

fn client(scripted: ScriptedHttpClient) -> Arc<dyn HttpClient> {
    Arc::new(scripted)
}

fn provider_cases() -> Vec<ProviderCase> {
    let http = client(
        ScriptedHttpClient::new()
            .on("ticker/price", HttpResponse::ok(BTC_TICKER))
            .on("GLOBAL_QUOTE", HttpResponse::ok(KO_QUOTE))
            .on("nasdaq-listings", HttpResponse::ok(NASDAQ_CSV)),
    );

    vec![
        ProviderCase {
            id: ProviderId::Binance,
            source: Arc::new(BinanceAdapter::new(Arc::clone(&http))),
            supports_universe: true,
            supports_quote: true,
            supports_dividends: false,
        },
        ProviderCase {
            id: ProviderId::Alphavantage,
            source: Arc::new(AlphaVantageAdapter::new(Arc::clone(&http), "contract-key")),
            supports_universe: false,
            supports_quote: true,
            supports_dividends: true,
        },
        ProviderCase {
            id: ProviderId::Datahub,
            source: Arc::new(DatahubListingAdapter::nasdaq(http)),
            supports_universe: true,
            supports_quote: false,
            supports_dividends: false,
        },
    ]
}

#[test]
fn capability_matrix_matches_adapter_contract() {
    for case in provider_cases() {
        let capabilities = case.source.capabilities();
        assert_eq!(case.source.id(), case.id);
        assert_eq!(
            capabilities.supports(Endpoint::Universe),
            case.supports_universe,
            "provider '{}': universe",
            case.id
        );
        assert_eq!(
            capabilities.supports(Endpoint::Quote),
            case.supports_quote,
            "provider '{}': quote",
            case.id
        );
        assert_eq!(
            capabilities.supports(Endpoint::Dividends),
            case.supports_dividends,
            "provider '{}': dividends",
            case.id
        );
    }
}

#[tokio::test]
async fn unsupported_endpoints_fail_without_network_calls() {
    for case in provider_cases() {
        if !case.supports_universe {
            let error = case.source.universe().await.expect_err("universe unsupported");
            assert_eq!(error.kind(), FetchErrorKind::Unsupported, "provider '{}'", case.id);
        }
        if !case.supports_quote {
            let error = case.source.quote(symbol("AAPL")).await.expect_err("quote unsupported");
            assert_eq!(error.kind(), FetchErrorKind::Unsupported, "provider '{}'", case.id);
        }
        if !case.supports_dividends {
            let error = case
                .source
                .dividends(symbol("AAPL"))
                .await
                .expect_err("dividends unsupported");
            assert_eq!(error.kind(), FetchErrorKind::Unsupported, "provider '{}'", case.id);
        }
    }
}

#[tokio::test]
async fn quotes_carry_the_requested_symbol() {
    let cases = provider_cases();

    let btc = cases[0].source.quote(symbol("BTC")).await.expect("binance quote");
    assert_eq!(btc.symbol, symbol("BTC"));
    assert_eq!(btc.price, dec!(64000.5));
    assert_eq!(btc.source, ProviderId::Binance);

    let ko = cases[1].source.quote(symbol("KO")).await.expect("alphavantage quote");
    assert_eq!(ko.symbol, symbol("KO"));
    assert_eq!(ko.price, dec!(61.2));
    assert_eq!(ko.source, ProviderId::Alphavantage);
}

#[tokio::test]
async fn quote_for_a_different_instrument_is_malformed() {
    let http = client(ScriptedHttpClient::new().on("GLOBAL_QUOTE", HttpResponse::ok(KO_QUOTE)));
    let adapter = AlphaVantageAdapter::new(http, "contract-key");

    let error = adapter.quote(symbol("PEP")).await.expect_err("symbol substitution");
    assert_eq!(error.kind(), FetchErrorKind::Malformed);
}

#[tokio::test]
async fn http_status_maps_onto_failure_kinds() {
    let cases = [
        (404, FetchErrorKind::NotFound),
        (429, FetchErrorKind::RateLimited),
        (503, FetchErrorKind::Transient),
        (400, FetchErrorKind::Malformed),
    ];

    for (status, expected) in cases {
        let http = client(
            ScriptedHttpClient::new()
                .on("GLOBAL_QUOTE", HttpResponse::new(status, "{}"))
                .on("exchangeInfo", HttpResponse::new(status, "<html></html>")),
        );

        let alphavantage = AlphaVantageAdapter::new(Arc::clone(&http), "contract-key");
        let error = alphavantage.quote(symbol("KO")).await.expect_err("status failure");
        assert_eq!(error.kind(), expected, "alphavantage status {status}");

        let binance = BinanceAdapter::new(http);
        let error = binance.universe().await.expect_err("status failure");
        assert_eq!(error.kind(), expected, "binance status {status}");
    }
}

#[tokio::test]
async fn binance_unknown_pair_is_not_found() {
    let http = client(ScriptedHttpClient::new().on(
        "ticker/price",
        HttpResponse::new(400, r#"{"code":-1121,"msg":"Invalid symbol."}"#),
    ));
    let adapter = BinanceAdapter::new(http);

    let error = adapter.quote(symbol("NOPE")).await.expect_err("unknown pair");
    assert_eq!(error.kind(), FetchErrorKind::NotFound);
}

#[tokio::test]
async fn alphavantage_notices_map_to_rate_limit_and_not_found() {
    let http = client(
        ScriptedHttpClient::new()
            .on(
                "symbol=KO",
                HttpResponse::ok(r#"{"Information": "API rate limit reached."}"#),
            )
            .on(
                "symbol=NOPE",
                HttpResponse::ok(r#"{"Error Message": "Invalid API call."}"#),
            ),
    );
    let adapter = AlphaVantageAdapter::new(http, "contract-key");

    let limited = adapter.quote(symbol("KO")).await.expect_err("throttled");
    assert_eq!(limited.kind(), FetchErrorKind::RateLimited);

    let missing = adapter.dividends(symbol("NOPE")).await.expect_err("unknown");
    assert_eq!(missing.kind(), FetchErrorKind::NotFound);
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let http = client(ScriptedHttpClient::new().on("ticker/price", HttpResponse::ok("<html>")));
    let adapter = BinanceAdapter::new(http);

    let error = adapter.quote(symbol("BTC")).await.expect_err("html body");
    assert_eq!(error.kind(), FetchErrorKind::Malformed);
}

#[tokio::test]
async fn transport_failures_are_transient_and_hide_the_api_key() {
    let http = client(
        ScriptedHttpClient::new().fail("GLOBAL_QUOTE", HttpError::timeout("request timed out")),
    );
    let adapter = AlphaVantageAdapter::new(http, "very-secret-key");

    let error = adapter.quote(symbol("KO")).await.expect_err("transport failure");
    assert_eq!(error.kind(), FetchErrorKind::Transient);
    assert!(error.retryable());
    assert!(error.message().contains("timed out"));
    assert!(!error.to_string().contains("very-secret-key"));
}

#[tokio::test]
async fn dividend_history_is_returned_in_date_order() {
    let http = client(
        ScriptedHttpClient::new().on("TIME_SERIES_MONTHLY_ADJUSTED", HttpResponse::ok(KO_MONTHLY)),
    );
    let adapter = AlphaVantageAdapter::new(http, "contract-key");

    let history = adapter.dividends(symbol("KO")).await.expect("history");
    assert_eq!(history.symbol, symbol("KO"));
    assert_eq!(history.entries.len(), 4);
    assert!(history
        .entries
        .windows(2)
        .all(|pair| pair[0].date <= pair[1].date));
    assert_eq!(history.entries[3].amount, dec!(0.46));
}

#[tokio::test]
async fn listing_snapshot_reads_symbols() {
    let http = client(ScriptedHttpClient::new().on("nasdaq-listings", HttpResponse::ok(NASDAQ_CSV)));
    let adapter = DatahubListingAdapter::nasdaq(http);

    let universe = adapter.universe().await.expect("universe");
    assert_eq!(universe.len(), 2);
    assert!(universe.contains(&symbol("MSFT")));
}
