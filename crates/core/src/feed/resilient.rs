//! Timeout, retry and stale fallback around external feeds.
//!
//! Every call is bounded by a per-attempt timeout and retried with
//! exponential backoff. When all attempts fail the last known good value is
//! served as stale from a Moka cache, or the call reports `Unavailable`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use enerbudget_shared::FeedConfig;
use enerbudget_shared::types::MeterId;
use moka::sync::Cache;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::types::{ActualCost, BillingFeed, DailyConsumption, FeedError, Fetched, PriceFeed};

/// Maximum number of cached entries per feed operation.
const CACHE_CAPACITY: u64 = 10_000;

/// Upper bound for a single backoff delay.
const MAX_BACKOFF_MS: u64 = 5_000;

/// Call policy for a resilient feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Attempts before degrading.
    pub max_attempts: u32,
    /// First backoff delay; doubled after every failed attempt.
    pub backoff_base: Duration,
    /// How long a value stays usable as a stale fallback.
    pub stale_ttl: Duration,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for FeedPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            stale_ttl: Duration::from_secs(config.stale_ttl_secs),
        }
    }
}

type HistoryKey = (MeterId, NaiveDate, NaiveDate);
type ActualsKey = (Vec<MeterId>, NaiveDate, NaiveDate);

/// A feed wrapped with timeout, bounded retry and stale fallback.
pub struct ResilientFeed<F> {
    inner: F,
    policy: FeedPolicy,
    prices: Cache<(MeterId, NaiveDate), Option<Decimal>>,
    history: Cache<HistoryKey, Arc<Vec<DailyConsumption>>>,
    actuals: Cache<ActualsKey, Arc<Vec<ActualCost>>>,
}

impl<F> ResilientFeed<F> {
    /// Wraps `inner` with the given policy.
    #[must_use]
    pub fn new(inner: F, policy: FeedPolicy) -> Self {
        Self {
            inner,
            policy,
            prices: build_cache(policy.stale_ttl),
            history: build_cache(policy.stale_ttl),
            actuals: build_cache(policy.stale_ttl),
        }
    }

    /// Returns the wrapped feed.
    pub const fn inner(&self) -> &F {
        &self.inner
    }

    /// Returns the call policy.
    pub const fn policy(&self) -> &FeedPolicy {
        &self.policy
    }

    async fn call_with_retry<T, Fut>(
        &self,
        operation: &'static str,
        mut call: impl FnMut() -> Fut,
    ) -> Result<T, FeedError>
    where
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let timeout_ms = u64::try_from(self.policy.timeout.as_millis()).unwrap_or(u64::MAX);
        let mut last_error = FeedError::Unavailable("no attempt made".to_string());

        for attempt in 1..=self.policy.max_attempts {
            match tokio::time::timeout(self.policy.timeout, call()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Feed call succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    warn!(operation, attempt, error = %e, "Feed call failed");
                    last_error = e;
                }
                Err(_) => {
                    warn!(operation, attempt, timeout_ms, "Feed call timed out");
                    last_error = FeedError::Timeout(timeout_ms);
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(compute_backoff(self.policy.backoff_base, attempt)).await;
            }
        }

        Err(last_error)
    }
}

impl<F: PriceFeed> ResilientFeed<F> {
    /// Unit price for a meter on a day.
    pub async fn unit_price(&self, meter_id: MeterId, on: NaiveDate) -> Fetched<Option<Decimal>> {
        let key = (meter_id, on);
        let result = self
            .call_with_retry("unit_price", || self.inner.unit_price(meter_id, on))
            .await;
        resolve(&self.prices, key, result)
    }

    /// Historical daily consumption of a meter.
    pub async fn historical_consumption(
        &self,
        meter_id: MeterId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Fetched<Arc<Vec<DailyConsumption>>> {
        let key = (meter_id, from, to);
        let result = self
            .call_with_retry("historical_consumption", || {
                self.inner.historical_consumption(meter_id, from, to)
            })
            .await
            .map(Arc::new);
        resolve(&self.history, key, result)
    }
}

impl<F: BillingFeed> ResilientFeed<F> {
    /// Billed actuals for a set of meters.
    pub async fn actual_costs(
        &self,
        meter_ids: &[MeterId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Fetched<Arc<Vec<ActualCost>>> {
        let key = (meter_ids.to_vec(), from, to);
        let result = self
            .call_with_retry("actual_costs", || self.inner.actual_costs(meter_ids, from, to))
            .await
            .map(Arc::new);
        resolve(&self.actuals, key, result)
    }
}

fn build_cache<K, V>(ttl: Duration) -> Cache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(CACHE_CAPACITY)
        .time_to_live(ttl)
        .build()
}

fn resolve<K, V>(cache: &Cache<K, V>, key: K, result: Result<V, FeedError>) -> Fetched<V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    match result {
        Ok(value) => {
            cache.insert(key, value.clone());
            Fetched::Fresh(value)
        }
        Err(e) => match cache.get(&key) {
            Some(value) => {
                warn!(error = %e, "Serving stale feed value");
                Fetched::Stale(value)
            }
            None => {
                warn!(error = %e, "Feed unavailable and no cached value");
                Fetched::Unavailable
            }
        },
    }
}

fn compute_backoff(base: Duration, attempt: u32) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(MAX_BACKOFF_MS);
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}
