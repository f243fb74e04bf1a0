use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::normalize_symbols;
use crate::error::{Context, Result};

/// Symbols shown when no watchlist file exists yet.
const DEFAULT_WATCHLIST: &[&str] = &["AAPL", "MSFT", "NVDA", "SPY"];

#[derive(Debug, Serialize, Deserialize)]
struct WatchlistFile {
    symbols: Vec<String>,
}

/// File-backed store of the curated symbol list with read / replace-all
/// semantics. Writes go through a temp file and rename so a crash mid-write
/// never leaves a truncated list behind.
pub struct WatchlistStore {
    path: PathBuf,
}

impl WatchlistStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read watchlist file {}", self.path.display()))?;
        let file: WatchlistFile = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse watchlist file {}", self.path.display()))?;
        Ok(normalize_symbols(file.symbols))
    }

    /// Replace the whole list, returning the normalized form that was saved.
    pub fn replace(&self, symbols: Vec<String>) -> Result<Vec<String>> {
        let symbols = normalize_symbols(symbols);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create watchlist directory {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&WatchlistFile {
            symbols: symbols.clone(),
        })
        .context("failed to serialize watchlist")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("failed to write watchlist file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move watchlist into {}", self.path.display()))?;

        Ok(symbols)
    }
}
