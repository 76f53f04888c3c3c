//! Retry logic with exponential backoff and jitter.

use std::time::Duration;

use crate::data_source::FetchError;

/// Backoff strategy for retrying failed fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped_seconds = seconds.min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(capped_seconds.max(0.0));

                if !jitter {
                    return delay;
                }

                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                let spread = delay_ms / 2;
                let offset = fastrand::u64(0..=spread.saturating_mul(2));
                Duration::from_millis((delay_ms - spread).saturating_add(offset))
            }
        }
    }
}

/// Bounded retry policy applied by the batch fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns the wait before the next attempt, or `None` when the failure
    /// is final. `attempt` counts retries already made.
    pub fn next_delay(&self, error: &FetchError, attempt: u32) -> Option<Duration> {
        if !error.retryable() || attempt >= self.max_retries {
            return None;
        }
        Some(self.backoff.delay(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_until_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_of_the_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                assert!(delay_ms >= expected * 0.5, "attempt={attempt} delay={delay_ms}");
                assert!(delay_ms <= expected * 1.5, "attempt={attempt} delay={delay_ms}");
            }
        }
    }

    #[test]
    fn retries_transient_failures_up_to_the_limit() {
        let config = RetryConfig::fixed(Duration::from_millis(50), 2);
        let error = FetchError::transient("connection reset");

        assert_eq!(config.next_delay(&error, 0), Some(Duration::from_millis(50)));
        assert_eq!(config.next_delay(&error, 1), Some(Duration::from_millis(50)));
        assert_eq!(config.next_delay(&error, 2), None);
    }

    #[test]
    fn never_retries_final_failures() {
        let config = RetryConfig::exponential(5);

        assert_eq!(config.next_delay(&FetchError::not_found("unknown"), 0), None);
        assert_eq!(config.next_delay(&FetchError::malformed("bad body"), 0), None);
    }

    #[test]
    fn no_retry_config_gives_up_immediately() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.next_delay(&FetchError::rate_limited("429"), 0), None);
    }
}
