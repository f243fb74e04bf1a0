use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration derived from environment variables.
///
/// Every tuning knob of the fetch pipeline lives here so the defaults can be
/// tightened in production without a rebuild.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,

    /// Base URL of the upstream market-data provider.
    pub provider_base_url: String,
    /// Wall-clock deadline applied to every upstream call.
    pub upstream_timeout: Duration,

    // ── Cache freshness ────────────────────────────────────────────
    pub quote_ttl: Duration,
    pub history_ttl: Duration,

    // ── Admission gate ─────────────────────────────────────────────
    pub min_request_interval: Duration,

    // ── Quote batch fetching ───────────────────────────────────────
    pub quote_chunk_size: usize,
    pub quote_chunk_pause: Duration,

    // ── History fetching ───────────────────────────────────────────
    pub history_pacing: Duration,
    pub history_retry_attempts: u32,
    pub history_backoff_step: Duration,
    pub history_window_hours: i64,
    pub candle_interval_minutes: u32,

    // ── Watchlist / static assets ──────────────────────────────────
    pub watchlist_path: PathBuf,
    pub static_dir: PathBuf,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn env_secs(name: &str, default_s: u64) -> Duration {
    Duration::from_secs(env_u64(name, default_s))
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind: env_str("WATCHBOARD_BIND", "127.0.0.1"),
            port: env_u16("WATCHBOARD_PORT", 8090),
            provider_base_url: env_str("WATCHBOARD_PROVIDER_URL", "https://api.marketdata.local"),
            upstream_timeout: env_secs("WATCHBOARD_UPSTREAM_TIMEOUT_S", 10),
            quote_ttl: env_secs("WATCHBOARD_QUOTE_TTL_S", 30),
            history_ttl: env_secs("WATCHBOARD_HISTORY_TTL_S", 15 * 60),
            min_request_interval: env_millis("WATCHBOARD_MIN_REQUEST_INTERVAL_MS", 2_000),
            quote_chunk_size: env_usize("WATCHBOARD_QUOTE_CHUNK_SIZE", 10).max(1),
            quote_chunk_pause: env_millis("WATCHBOARD_QUOTE_CHUNK_PAUSE_MS", 500),
            history_pacing: env_millis("WATCHBOARD_HISTORY_PACING_MS", 1_500),
            history_retry_attempts: env_u32("WATCHBOARD_HISTORY_RETRY_ATTEMPTS", 3).max(1),
            history_backoff_step: env_millis("WATCHBOARD_HISTORY_BACKOFF_STEP_MS", 2_000),
            history_window_hours: env_u64("WATCHBOARD_HISTORY_WINDOW_H", 24) as i64,
            candle_interval_minutes: env_u32("WATCHBOARD_CANDLE_INTERVAL_MIN", 15).max(1),
            watchlist_path: PathBuf::from(env_str("WATCHBOARD_WATCHLIST_FILE", "watchlist.json")),
            static_dir: PathBuf::from(env_str("WATCHBOARD_STATIC_DIR", "frontend/dist")),
        }
    }
}
