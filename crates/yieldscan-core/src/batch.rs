//! Bounded-concurrency fan-out of per-symbol requests against one provider.
//!
//! A [`BatchFetcher`] owns the in-flight permits for its provider, so two
//! batches running at once still share one `max_in_flight` budget. Every
//! attempt holds a permit for its whole duration and runs under the
//! per-request timeout. Retries release the permit while they back off.
//!
//! The whole batch runs under `batch_timeout`. When it expires, outstanding
//! tasks are aborted and their symbols are reported as transient failures.
//! Dropping the returned future aborts every task it spawned.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::data_source::{DataSource, FetchError};
use crate::domain::{DividendHistory, Quote};
use crate::provider_policy::SourcePolicy;
use crate::retry::RetryConfig;
use crate::throttling::RequestThrottle;
use crate::{ProviderId, Symbol, ValidationError};

/// Per-symbol results of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub values: BTreeMap<Symbol, T>,
    pub failures: BTreeMap<Symbol, FetchError>,
    /// Set when the batch deadline cut off outstanding requests.
    pub deadline_exceeded: bool,
    /// Symbols still outstanding when the deadline hit.
    pub pending: usize,
    pub elapsed: Duration,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            failures: BTreeMap::new(),
            deadline_exceeded: false,
            pending: 0,
            elapsed: Duration::ZERO,
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn len(&self) -> usize {
        self.values.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Admission state shared by every attempt against one provider.
#[derive(Clone)]
struct Gate {
    provider: ProviderId,
    permits: Arc<Semaphore>,
    throttle: Option<RequestThrottle>,
    request_timeout: Duration,
    retry: RetryConfig,
}

impl Gate {
    async fn call<T, F, Fut>(&self, label: &str, mut attempt: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut retries = 0;
        loop {
            let error = match self.attempt_once(&mut attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let Some(delay) = self.retry.next_delay(&error, retries) else {
                return Err(error);
            };
            retries += 1;
            debug!(
                provider = %self.provider,
                target = label,
                kind = error.kind().as_str(),
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt_once<T, F, Fut>(&self, attempt: &mut F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::transient("request permits closed"))?;

        if let Some(throttle) = &self.throttle {
            throttle.ready().await;
        }

        match tokio::time::timeout(self.request_timeout, attempt()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::transient(format!(
                "{} request timed out after {}ms",
                self.provider,
                self.request_timeout.as_millis()
            ))),
        }
    }
}

/// Runs per-symbol requests for one provider under its [`SourcePolicy`].
pub struct BatchFetcher {
    policy: SourcePolicy,
    gate: Gate,
}

impl BatchFetcher {
    pub fn new(policy: SourcePolicy) -> Result<Self, ValidationError> {
        policy.validate()?;

        let gate = Gate {
            provider: policy.provider_id,
            permits: Arc::new(Semaphore::new(policy.max_in_flight)),
            throttle: RequestThrottle::from_policy(&policy),
            request_timeout: policy.request_timeout,
            retry: policy.retry.clone(),
        };

        Ok(Self { policy, gate })
    }

    pub fn policy(&self) -> &SourcePolicy {
        &self.policy
    }

    pub fn provider_id(&self) -> ProviderId {
        self.policy.provider_id
    }

    pub fn max_in_flight(&self) -> usize {
        self.policy.max_in_flight
    }

    /// Fetches every distinct symbol, tolerating per-symbol failures.
    ///
    /// Each symbol lands in exactly one of `values` or `failures`.
    pub async fn fetch<T, F, Fut>(&self, symbols: &[Symbol], fetch: F) -> BatchOutcome<T>
    where
        T: Send + 'static,
        F: Fn(Symbol) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let started = Instant::now();
        let mut pending: BTreeSet<Symbol> = symbols.iter().cloned().collect();
        let mut outcome = BatchOutcome::default();

        if pending.is_empty() {
            return outcome;
        }

        let provider = self.provider_id();
        info!(
            provider = %provider,
            symbols = pending.len(),
            max_in_flight = self.policy.max_in_flight,
            "starting batch"
        );

        let fetch = Arc::new(fetch);
        let mut tasks = JoinSet::new();
        for symbol in &pending {
            let gate = self.gate.clone();
            let fetch = Arc::clone(&fetch);
            let symbol = symbol.clone();
            tasks.spawn(async move {
                let result = gate
                    .call(symbol.as_str(), || (*fetch)(symbol.clone()))
                    .await;
                (symbol, result)
            });
        }

        let deadline = started + self.policy.batch_timeout;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((symbol, result)))) => {
                    pending.remove(&symbol);
                    match result {
                        Ok(value) => {
                            outcome.values.insert(symbol, value);
                        }
                        Err(error) => {
                            debug!(
                                provider = %provider,
                                symbol = %symbol,
                                kind = error.kind().as_str(),
                                "symbol failed"
                            );
                            outcome.failures.insert(symbol, error);
                        }
                    }
                }
                Ok(Some(Err(join_error))) => {
                    warn!(provider = %provider, error = %join_error, "fetch task did not complete");
                }
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    outcome.deadline_exceeded = true;
                    outcome.pending = pending.len();
                    warn!(
                        provider = %provider,
                        pending = pending.len(),
                        batch_timeout_ms = self.policy.batch_timeout.as_millis() as u64,
                        "batch deadline exceeded"
                    );
                    break;
                }
            }
        }

        let reason = if outcome.deadline_exceeded {
            "batch deadline exceeded"
        } else {
            "fetch task ended without a result"
        };
        for symbol in pending {
            outcome
                .failures
                .insert(symbol, FetchError::transient(reason));
        }

        outcome.elapsed = started.elapsed();
        info!(
            provider = %provider,
            succeeded = outcome.values.len(),
            failed = outcome.failures.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "batch finished"
        );
        outcome
    }

    pub async fn fetch_quotes(
        &self,
        source: Arc<dyn DataSource>,
        symbols: &[Symbol],
    ) -> BatchOutcome<Quote> {
        self.fetch(symbols, move |symbol| {
            let source = Arc::clone(&source);
            async move { source.quote(symbol).await }
        })
        .await
    }

    pub async fn fetch_dividends(
        &self,
        source: Arc<dyn DataSource>,
        symbols: &[Symbol],
    ) -> BatchOutcome<DividendHistory> {
        self.fetch(symbols, move |symbol| {
            let source = Arc::clone(&source);
            async move { source.dividends(symbol).await }
        })
        .await
    }

    /// Runs a single request under the same permits, retry and timeouts as
    /// a batch. Used for universe snapshots.
    pub async fn fetch_one<T, F, Fut>(&self, label: &str, fetch: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match tokio::time::timeout(self.policy.batch_timeout, self.gate.call(label, fetch)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(provider = %self.provider_id(), target = label, "request deadline exceeded");
                Err(FetchError::transient("batch deadline exceeded"))
            }
        }
    }
}
