use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Latest traded price and day change for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub change_percent: f64,
}

/// One sampled closing price inside the trailing history window.
///
/// Upstream payloads sometimes label the field `close`; both spellings
/// reduce to the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(alias = "close")]
    pub value: f64,
}

/// A cached value together with the instant it was fetched.
///
/// `fetched_at` comes from a monotonic clock, so a successful refresh can
/// never back-date an entry.
#[derive(Debug, Clone)]
pub struct Stamped<V> {
    pub value: V,
    pub fetched_at: Instant,
}

impl<V> Stamped<V> {
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) <= ttl
    }
}

/// Keyed store of per-symbol values with a fixed time-to-live.
///
/// Entries are only ever written by a successful fetch and are never evicted
/// on failure: a stale entry keeps serving as last-known-good until a later
/// fetch supersedes it. The keyspace is an operator-curated watchlist, so
/// there is no capacity bound beyond TTL staleness.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Stamped<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Stamped<V>> {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .get(symbol)
            .cloned()
    }

    pub fn put(&self, symbol: &str, value: V) {
        let stamped = Stamped {
            value,
            fetched_at: Instant::now(),
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(symbol.to_string(), stamped);
    }

    /// Whether the entry for `symbol` exists and is younger than the TTL.
    pub fn fresh(&self, symbol: &str, now: Instant) -> bool {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .get(symbol)
            .map(|entry| entry.is_fresh(self.ttl, now))
            .unwrap_or(false)
    }

    /// Subset of `symbols` that needs a fetch: absent entries and entries
    /// past the TTL alike. Request order is preserved.
    pub fn stale_subset(&self, symbols: &[String], now: Instant) -> Vec<String> {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        symbols
            .iter()
            .filter(|symbol| {
                entries
                    .get(symbol.as_str())
                    .map(|entry| !entry.is_fresh(self.ttl, now))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }
}

/// Case-normalize and deduplicate ticker symbols, preserving first-seen
/// order. The normalized form is the identity used for every cache lookup.
pub fn normalize_symbols<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for symbol in raw {
        let normalized = symbol.as_ref().trim().to_ascii_uppercase();
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }
    out
}
