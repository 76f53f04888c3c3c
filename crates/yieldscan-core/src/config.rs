//! Aggregator configuration: defaults, optional JSON file, environment.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::adapters::binance::DEFAULT_QUOTE_ASSET;
use crate::dividend::DividendWindow;
use crate::provider_policy::SourcePolicy;
use crate::valuation::{validate_target_yield, DEFAULT_TARGET_YIELD_RATE};
use crate::{CoreError, ProviderId};

/// Primary environment variable for the Alpha Vantage key.
pub const API_KEY_ENV: &str = "YIELDSCAN_ALPHAVANTAGE_API_KEY";
/// Fallback environment variable for the Alpha Vantage key.
pub const API_KEY_FALLBACK_ENV: &str = "ALPHAVANTAGE_API_KEY";

#[derive(Clone, PartialEq)]
pub struct AggregatorConfig {
    pub target_yield_rate: Decimal,
    pub dividend_window: DividendWindow,
    pub crypto_quote_asset: String,
    pub alphavantage_api_key: Option<String>,
    pub policies: BTreeMap<ProviderId, SourcePolicy>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            target_yield_rate: DEFAULT_TARGET_YIELD_RATE,
            dividend_window: DividendWindow::default(),
            crypto_quote_asset: DEFAULT_QUOTE_ASSET.to_owned(),
            alphavantage_api_key: None,
            policies: ProviderId::ALL
                .into_iter()
                .map(|provider| (provider, SourcePolicy::default_for(provider)))
                .collect(),
        }
    }
}

impl Debug for AggregatorConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorConfig")
            .field("target_yield_rate", &self.target_yield_rate)
            .field("dividend_window", &self.dividend_window)
            .field("crypto_quote_asset", &self.crypto_quote_asset)
            .field(
                "alphavantage_api_key",
                &self.alphavantage_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("policies", &self.policies)
            .finish()
    }
}

/// On-disk shape. Every field is optional and layered over the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    target_yield_rate: Option<Decimal>,
    dividend_window: Option<DividendWindow>,
    crypto_quote_asset: Option<String>,
    alphavantage_api_key: Option<String>,
    providers: BTreeMap<ProviderId, PolicyOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PolicyOverride {
    max_in_flight: Option<usize>,
    request_timeout_ms: Option<u64>,
    batch_timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    quota_limit: Option<u32>,
}

impl PolicyOverride {
    fn apply(self, policy: &mut SourcePolicy) {
        if let Some(max_in_flight) = self.max_in_flight {
            policy.max_in_flight = max_in_flight;
        }
        if let Some(ms) = self.request_timeout_ms {
            policy.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.batch_timeout_ms {
            policy.batch_timeout = Duration::from_millis(ms);
        }
        if let Some(max_retries) = self.max_retries {
            policy.retry.max_retries = max_retries;
        }
        if let Some(quota_limit) = self.quota_limit {
            policy.quota_limit = (quota_limit > 0).then_some(quota_limit);
        }
    }
}

impl AggregatorConfig {
    /// Defaults, then the optional JSON file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let file: ConfigFile = serde_json::from_str(raw)?;
        let mut config = Self::default();

        if let Some(rate) = file.target_yield_rate {
            config.target_yield_rate = rate;
        }
        if let Some(window) = file.dividend_window {
            config.dividend_window = window;
        }
        if let Some(asset) = file.crypto_quote_asset {
            config.crypto_quote_asset = asset.trim().to_ascii_uppercase();
        }
        config.alphavantage_api_key = file.alphavantage_api_key.filter(|key| !key.trim().is_empty());

        for (provider, overrides) in file.providers {
            let policy = config
                .policies
                .entry(provider)
                .or_insert_with(|| SourcePolicy::default_for(provider));
            overrides.apply(policy);
        }

        config.validate()?;
        Ok(config)
    }

    /// Environment keys win over file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup(API_KEY_ENV)
            .or_else(|| lookup(API_KEY_FALLBACK_ENV))
            .filter(|key| !key.trim().is_empty());
        if key.is_some() {
            self.alphavantage_api_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_target_yield(self.target_yield_rate)?;
        self.dividend_window.validate()?;

        if self.crypto_quote_asset.is_empty()
            || !self
                .crypto_quote_asset
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric())
        {
            return Err(CoreError::Config(format!(
                "crypto quote asset '{}' must be non-empty and alphanumeric",
                self.crypto_quote_asset
            )));
        }

        for policy in self.policies.values() {
            policy.validate()?;
        }
        Ok(())
    }

    pub fn policy(&self, provider: ProviderId) -> SourcePolicy {
        self.policies
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| SourcePolicy::default_for(provider))
    }
}
