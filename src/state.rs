use std::sync::Arc;

use crate::config::Config;
use crate::error::{Context, Result};
use crate::fetch::{HttpMarketProvider, MarketProvider};
use crate::service::MarketService;
use crate::watchlist::WatchlistStore;

/// Shared application state, passed to all route handlers via
/// `axum::extract::State`. Created once at process start and lives for the
/// process lifetime.
pub struct AppState {
    pub config: Config,
    pub market: MarketService,
    pub watchlist: WatchlistStore,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .context("failed to construct upstream HTTP client")?;
        let provider = Arc::new(HttpMarketProvider::new(client, &config.provider_base_url));
        Ok(Self::with_provider(config, provider))
    }

    /// Assemble state around an externally supplied provider; the HTTP
    /// provider in production, a scripted double in tests.
    pub fn with_provider(config: Config, provider: Arc<dyn MarketProvider>) -> Arc<Self> {
        let market = MarketService::new(&config, provider);
        let watchlist = WatchlistStore::new(&config.watchlist_path);
        Arc::new(Self {
            config,
            market,
            watchlist,
        })
    }
}
