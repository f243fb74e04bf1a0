use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use crate::cache::{normalize_symbols, Candle, Quote, TtlCache};
use crate::config::Config;
use crate::fetch::{HistoryFetchScheduler, MarketProvider, QuoteBatchFetcher, RetryPolicy};
use crate::gate::RequestGate;

/// Everything the dashboard needs for one symbol: the latest quote plus the
/// trailing sparkline series. Symbols the caches have never seen yield the
/// zero-defaults rather than an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolSnapshot {
    pub price: f64,
    pub change_percent: f64,
    pub history: Vec<Candle>,
}

pub type MarketDataResponse = HashMap<String, SymbolSnapshot>;

/// Fetch-and-cache orchestration for the market-data endpoint.
///
/// Per request: the admission gate decides whether upstream work may start,
/// the stale subsets of the two caches are refilled (quotes batched,
/// history serial and paced), and the response is assembled from whatever
/// the caches hold afterwards. Fetch failures never propagate to the
/// caller; they only mean a symbol's data may be stale or absent.
pub struct MarketService {
    quotes: Arc<TtlCache<Quote>>,
    history: Arc<TtlCache<Vec<Candle>>>,
    quote_fetcher: QuoteBatchFetcher,
    history_scheduler: HistoryFetchScheduler,
    gate: RequestGate,
}

impl MarketService {
    pub fn new(cfg: &Config, provider: Arc<dyn MarketProvider>) -> Self {
        let quotes = Arc::new(TtlCache::new(cfg.quote_ttl));
        let history = Arc::new(TtlCache::new(cfg.history_ttl));

        let quote_fetcher = QuoteBatchFetcher::new(
            Arc::clone(&provider),
            Arc::clone(&quotes),
            cfg.quote_chunk_size,
            cfg.quote_chunk_pause,
        );
        let history_scheduler = HistoryFetchScheduler::new(
            provider,
            Arc::clone(&history),
            RetryPolicy::new(cfg.history_retry_attempts, cfg.history_backoff_step),
            cfg.history_pacing,
            cfg.history_window_hours,
            cfg.candle_interval_minutes,
        );

        Self {
            quotes,
            history,
            quote_fetcher,
            history_scheduler,
            gate: RequestGate::new(cfg.min_request_interval),
        }
    }

    /// Answer one dashboard poll for `raw_symbols`.
    ///
    /// The history refill runs to completion before the response is
    /// assembled, so an accepted request always returns the freshest data
    /// the rate limits allow; total latency stays bounded by the per-call
    /// timeout, the retry budget, and pacing.
    pub async fn market_data(&self, raw_symbols: &[String]) -> MarketDataResponse {
        let symbols = normalize_symbols(raw_symbols.iter().map(String::as_str));
        if symbols.is_empty() {
            return MarketDataResponse::new();
        }

        let now = Instant::now();
        if self.gate.try_accept(now) {
            let quote_stale = self.quotes.stale_subset(&symbols, now);
            if !quote_stale.is_empty() {
                self.quote_fetcher.refill(&quote_stale).await;
            }

            let history_stale = self.history.stale_subset(&symbols, now);
            if !history_stale.is_empty() {
                self.history_scheduler.refill(&history_stale).await;
            }
        } else {
            log::debug!(
                "request inside the admission window, serving {} symbols from cache",
                symbols.len()
            );
        }

        self.assemble(&symbols)
    }

    /// Merge both caches into a complete answer covering exactly the
    /// requested symbols, regardless of fetch participation or outcome.
    fn assemble(&self, symbols: &[String]) -> MarketDataResponse {
        let mut response = MarketDataResponse::with_capacity(symbols.len());
        for symbol in symbols {
            let quote = self.quotes.get(symbol).map(|entry| entry.value);
            let history = self.history.get(symbol).map(|entry| entry.value);

            let (price, change_percent) = match quote {
                Some(quote) => (quote.price, quote.change_percent),
                None => (0.0, 0.0),
            };

            response.insert(
                symbol.clone(),
                SymbolSnapshot {
                    price,
                    change_percent,
                    history: history.unwrap_or_default(),
                },
            );
        }
        response
    }
}
