use std::time::Duration;

use crate::retry::{Backoff, RetryConfig};
use crate::{ProviderId, ValidationError};

/// Concurrency, timeout, quota and retry limits applied to one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub provider_id: ProviderId,
    /// Upper bound on requests outstanding against the provider at once.
    pub max_in_flight: usize,
    /// Budget for a single request attempt.
    pub request_timeout: Duration,
    /// Wall-clock budget for a whole batch, retries included.
    pub batch_timeout: Duration,
    pub quota_window: Duration,
    /// Requests allowed per `quota_window`; `None` disables pacing.
    pub quota_limit: Option<u32>,
    pub retry: RetryConfig,
}

impl SourcePolicy {
    pub fn binance_default() -> Self {
        Self {
            provider_id: ProviderId::Binance,
            max_in_flight: 16,
            request_timeout: Duration::from_secs(5),
            batch_timeout: Duration::from_secs(60),
            quota_window: Duration::from_secs(60),
            quota_limit: None,
            retry: RetryConfig::exponential(3),
        }
    }

    pub fn alphavantage_default() -> Self {
        Self {
            provider_id: ProviderId::Alphavantage,
            max_in_flight: 4,
            request_timeout: Duration::from_secs(10),
            batch_timeout: Duration::from_secs(120),
            quota_window: Duration::from_secs(60),
            quota_limit: Some(75),
            retry: RetryConfig {
                max_retries: 3,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(1),
                    factor: 2.0,
                    max: Duration::from_secs(15),
                    jitter: true,
                },
            },
        }
    }

    pub fn datahub_default() -> Self {
        Self {
            provider_id: ProviderId::Datahub,
            max_in_flight: 2,
            request_timeout: Duration::from_secs(20),
            batch_timeout: Duration::from_secs(60),
            quota_window: Duration::from_secs(60),
            quota_limit: None,
            retry: RetryConfig::exponential(2),
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Binance => Self::binance_default(),
            ProviderId::Alphavantage => Self::alphavantage_default(),
            ProviderId::Datahub => Self::datahub_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_in_flight == 0 {
            return Err(ValidationError::ZeroConcurrency {
                provider: self.provider_id.to_string(),
            });
        }
        Ok(())
    }
}
