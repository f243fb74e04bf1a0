use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::cache::Candle;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("upstream rate limit hit")]
    RateLimited,
    #[error("upstream returned status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("malformed upstream payload: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Rate-limit rejections are the only retryable failure class; anything
    /// else is terminal for the current fetch cycle.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Status(status) => *status == StatusCode::TOO_MANY_REQUESTS,
            Self::Transport(err) => err.status() == Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Decode(_) => false,
        }
    }
}

/// Latest quote for one symbol as returned by the batched upstream lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTick {
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
}

/// Seam between the fetch pipeline and the upstream market-data provider.
///
/// The orchestrator only ever talks to this trait, so the HTTP client can be
/// swapped for a scripted double in tests.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    /// Batched quote lookup: one call covers every symbol in `symbols`.
    async fn batch_quotes(&self, symbols: &[String]) -> Result<Vec<QuoteTick>, ProviderError>;

    /// Time-ranged candle lookup for a single symbol at a fixed interval,
    /// normalized to an ordered sequence of closing values, oldest first.
    async fn candle_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval_minutes: u32,
    ) -> Result<Vec<Candle>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct BatchQuotesBody {
    quotes: Vec<QuoteTick>,
}

/// The candle endpoint answers in one of two shapes: a bare ordered array of
/// candle objects, or a wrapper object carrying that array under `candles`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandlePayload {
    Bare(Vec<Candle>),
    Wrapped { candles: Vec<Candle> },
}

pub(crate) fn normalize_candle_payload(payload: Value) -> Result<Vec<Candle>, ProviderError> {
    let parsed: CandlePayload = serde_json::from_value(payload)
        .map_err(|err| ProviderError::Decode(err.to_string()))?;
    Ok(match parsed {
        CandlePayload::Bare(candles) => candles,
        CandlePayload::Wrapped { candles } => candles,
    })
}

/// HTTP implementation of [`MarketProvider`].
///
/// The shared client carries the wall-clock timeout, so a hung upstream call
/// can never stall a fetch cycle indefinitely.
pub struct HttpMarketProvider {
    client: Client,
    base_url: String,
}

impl HttpMarketProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn check_status(status: StatusCode) -> Result<(), ProviderError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketProvider for HttpMarketProvider {
    async fn batch_quotes(&self, symbols: &[String]) -> Result<Vec<QuoteTick>, ProviderError> {
        let url = format!(
            "{}/v1/quotes?symbols={}",
            self.base_url,
            symbols.join(",")
        );

        let response = self.client.get(&url).send().await?;
        Self::check_status(response.status())?;

        let body: BatchQuotesBody = response.json().await?;
        Ok(body.quotes)
    }

    async fn candle_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval_minutes: u32,
    ) -> Result<Vec<Candle>, ProviderError> {
        let url = format!(
            "{}/v1/candles?symbol={}&from={}&to={}&interval={}m",
            self.base_url,
            symbol,
            start.timestamp(),
            end.timestamp(),
            interval_minutes
        );

        let response = self.client.get(&url).send().await?;
        Self::check_status(response.status())?;

        let payload: Value = response.json().await?;
        normalize_candle_payload(payload)
    }
}


#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Per-symbol behavior of the scripted candle endpoint.
    #[derive(Debug, Clone)]
    pub enum HistoryScript {
        /// Respond with `points` evenly spaced closing values.
        Succeed { points: usize },
        /// Respond 429 on every attempt.
        RateLimited,
        /// Respond with a non-retryable server error.
        Broken,
        /// Sleep before responding, then succeed.
        Slow { delay: Duration, points: usize },
    }

    /// In-memory [`MarketProvider`] double that records every call it sees.
    pub struct ScriptedProvider {
        pub quote_batches: Mutex<Vec<Vec<String>>>,
        pub history_requests: Mutex<Vec<String>>,
        /// Indices of batch_quotes calls that fail with a server error.
        pub failing_batches: Vec<usize>,
        pub history_scripts: HashMap<String, HistoryScript>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self {
                quote_batches: Mutex::new(Vec::new()),
                history_requests: Mutex::new(Vec::new()),
                failing_batches: Vec::new(),
                history_scripts: HashMap::new(),
            }
        }

        pub fn with_failing_batches(mut self, indices: &[usize]) -> Self {
            self.failing_batches = indices.to_vec();
            self
        }

        pub fn with_history_script(mut self, symbol: &str, script: HistoryScript) -> Self {
            self.history_scripts.insert(symbol.to_string(), script);
            self
        }

        pub fn quote_batch_count(&self) -> usize {
            self.quote_batches.lock().unwrap().len()
        }

        pub fn history_request_count(&self) -> usize {
            self.history_requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MarketProvider for ScriptedProvider {
        async fn batch_quotes(&self, symbols: &[String]) -> Result<Vec<QuoteTick>, ProviderError> {
            let call_index = {
                let mut batches = self.quote_batches.lock().unwrap();
                batches.push(symbols.to_vec());
                batches.len() - 1
            };

            if self.failing_batches.contains(&call_index) {
                return Err(ProviderError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }

            Ok(symbols
                .iter()
                .enumerate()
                .map(|(i, symbol)| QuoteTick {
                    symbol: symbol.clone(),
                    price: 100.0 + i as f64,
                    change_percent: 0.5,
                })
                .collect())
        }

        async fn candle_range(
            &self,
            symbol: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _interval_minutes: u32,
        ) -> Result<Vec<Candle>, ProviderError> {
            self.history_requests.lock().unwrap().push(symbol.to_string());

            let script = self
                .history_scripts
                .get(symbol)
                .cloned()
                .unwrap_or(HistoryScript::Succeed { points: 96 });

            match script {
                HistoryScript::Succeed { points } => Ok(make_candles(points)),
                HistoryScript::RateLimited => Err(ProviderError::RateLimited),
                HistoryScript::Broken => {
                    Err(ProviderError::Status(StatusCode::INTERNAL_SERVER_ERROR))
                }
                HistoryScript::Slow { delay, points } => {
                    tokio::time::sleep(delay).await;
                    Ok(make_candles(points))
                }
            }
        }
    }

    pub fn make_candles(points: usize) -> Vec<Candle> {
        (0..points)
            .map(|i| Candle {
                value: 100.0 + i as f64 * 0.1,
            })
            .collect()
    }
}
