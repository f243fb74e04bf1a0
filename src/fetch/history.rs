use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};

use crate::cache::{Candle, TtlCache};
use crate::fetch::provider::MarketProvider;
use crate::fetch::retry::RetryPolicy;

/// Per-symbol guards ensuring at most one in-flight history fetch per
/// symbol across concurrent requests.
///
/// A second cycle wanting the same symbol parks on the symbol's async mutex
/// instead of launching a redundant fetch; once it acquires the guard it
/// re-checks freshness and usually finds the work already done. The guard
/// map grows with the watchlist, which is operator-curated and small.
struct InflightRegistry {
    guards: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InflightRegistry {
    fn new() -> Self {
        Self {
            guards: StdMutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, symbol: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let guard = {
            let mut guards = self.guards.lock().expect("inflight mutex poisoned");
            Arc::clone(
                guards
                    .entry(symbol.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        guard.lock_owned().await
    }
}

/// Refills the history cache one symbol at a time.
///
/// Serial fetching is deliberate: concurrent candle requests are what trips
/// the provider's rate limiter. Each symbol gets a bounded retry loop for
/// rate-limit rejections, and a fixed pacing delay separates consecutive
/// symbols regardless of outcome. The pacing delay, not the retry backoff,
/// is the primary rate-limit defense in the common case.
pub struct HistoryFetchScheduler {
    provider: Arc<dyn MarketProvider>,
    cache: Arc<TtlCache<Vec<Candle>>>,
    retry: RetryPolicy,
    pacing: Duration,
    window_hours: i64,
    interval_minutes: u32,
    inflight: InflightRegistry,
}

impl HistoryFetchScheduler {
    pub fn new(
        provider: Arc<dyn MarketProvider>,
        cache: Arc<TtlCache<Vec<Candle>>>,
        retry: RetryPolicy,
        pacing: Duration,
        window_hours: i64,
        interval_minutes: u32,
    ) -> Self {
        Self {
            provider,
            cache,
            retry,
            pacing,
            window_hours,
            interval_minutes,
            inflight: InflightRegistry::new(),
        }
    }

    pub async fn refill(&self, stale: &[String]) {
        for (index, symbol) in stale.iter().enumerate() {
            if index > 0 {
                sleep(self.pacing).await;
            }
            self.refresh_symbol(symbol).await;
        }
    }

    /// Fetch one symbol's trailing window, retrying rate-limit rejections
    /// with linearly increasing backoff. On success the cache entry is
    /// overwritten; on terminal failure the previous entry (stale or
    /// absent) is left untouched.
    async fn refresh_symbol(&self, symbol: &str) {
        let _guard = self.inflight.acquire(symbol).await;

        // A concurrent cycle may have refreshed this symbol while we waited
        // on the guard; skip the fetch if the entry is now fresh.
        if self.cache.fresh(symbol, Instant::now()) {
            log::debug!("history for {symbol} already refreshed, skipping fetch");
            return;
        }

        let end = Utc::now();
        let start = end - chrono::Duration::hours(self.window_hours);

        let mut attempt = 1;
        loop {
            match self
                .provider
                .candle_range(symbol, start, end, self.interval_minutes)
                .await
            {
                Ok(candles) => {
                    log::debug!("history for {symbol}: {} candles", candles.len());
                    self.cache.put(symbol, candles);
                    return;
                }
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.backoff(attempt);
                    log::warn!(
                        "history fetch for {symbol} rate limited on attempt {attempt}, \
                         retrying in {delay:?}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    log::warn!(
                        "history fetch for {symbol} failed on attempt {attempt}, \
                         keeping cached series: {err}"
                    );
                    return;
                }
            }
        }
    }
}
