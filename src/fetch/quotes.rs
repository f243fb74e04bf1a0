use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::cache::{Quote, TtlCache};
use crate::fetch::provider::MarketProvider;

/// Refills the quote cache for a set of stale symbols via chunked batch
/// calls to the upstream provider.
///
/// Chunks run sequentially with a fixed pause in between so a large
/// watchlist never bursts the provider. A failed chunk is contained: its
/// symbols keep whatever cache state they had, and the remaining chunks
/// still execute.
pub struct QuoteBatchFetcher {
    provider: Arc<dyn MarketProvider>,
    cache: Arc<TtlCache<Quote>>,
    chunk_size: usize,
    chunk_pause: Duration,
}

impl QuoteBatchFetcher {
    pub fn new(
        provider: Arc<dyn MarketProvider>,
        cache: Arc<TtlCache<Quote>>,
        chunk_size: usize,
        chunk_pause: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            chunk_size: chunk_size.max(1),
            chunk_pause,
        }
    }

    pub async fn refill(&self, stale: &[String]) {
        for (index, chunk) in stale.chunks(self.chunk_size).enumerate() {
            if index > 0 {
                sleep(self.chunk_pause).await;
            }

            match self.provider.batch_quotes(chunk).await {
                Ok(ticks) => {
                    for tick in ticks {
                        let symbol = tick.symbol.trim().to_ascii_uppercase();
                        self.cache.put(
                            &symbol,
                            Quote {
                                price: tick.price,
                                change_percent: tick.change_percent,
                            },
                        );
                    }
                }
                Err(err) => {
                    // Affected symbols retain their previous cache state.
                    log::warn!(
                        "quote batch of {} symbols failed, keeping cached values: {err}",
                        chunk.len()
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::fetch::provider::testing::ScriptedProvider;

    fn symbols(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("SYM{i}")).collect()
    }

    fn fetcher(provider: Arc<ScriptedProvider>) -> (QuoteBatchFetcher, Arc<TtlCache<Quote>>) {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(30)));
        let fetcher = QuoteBatchFetcher::new(
            provider,
            Arc::clone(&cache),
            10,
            Duration::from_millis(500),
        );
        (fetcher, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn partitions_into_chunks_with_pauses_between() {
        let provider = Arc::new(ScriptedProvider::new());
        let (fetcher, cache) = fetcher(Arc::clone(&provider));

        let started = Instant::now();
        fetcher.refill(&symbols(25)).await;

        let batches = provider.quote_batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        // Two inter-chunk pauses of 500 ms each.
        assert_eq!(started.elapsed(), Duration::from_millis(1_000));

        let now = Instant::now();
        for symbol in symbols(25) {
            assert!(cache.fresh(&symbol, now));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_chunk_is_contained_and_later_chunks_still_run() {
        let provider = Arc::new(ScriptedProvider::new().with_failing_batches(&[0]));
        let (fetcher, cache) = fetcher(Arc::clone(&provider));

        fetcher.refill(&symbols(15)).await;

        assert_eq!(provider.quote_batch_count(), 2);

        let now = Instant::now();
        // First chunk's symbols stay absent; second chunk landed.
        assert!(!cache.fresh("SYM0", now));
        assert!(cache.get("SYM0").is_none());
        assert!(cache.fresh("SYM10", now));
        assert!(cache.fresh("SYM14", now));
    }

    #[tokio::test(start_paused = true)]
    async fn single_chunk_has_no_pause() {
        let provider = Arc::new(ScriptedProvider::new());
        let (fetcher, _cache) = fetcher(Arc::clone(&provider));

        let started = Instant::now();
        fetcher.refill(&symbols(3)).await;

        assert_eq!(provider.quote_batch_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
