//! Runtime configuration for a sync session

use crate::cache::CachePolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Requests dispatched per throttle window
pub const THROTTLE_REQUESTS: usize = 45;

/// Pause between throttle windows
pub const THROTTLE_SLEEP: Duration = Duration::from_secs(60);

/// Upper bound for the response cache directory
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Days before a cached response expires
pub const DEFAULT_CACHE_EXPIRY_DAYS: i64 = 7;

/// Failed attempts tolerated per request before the run is cancelled
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Auto-update interval used when none was persisted
pub const DEFAULT_AUTO_UPDATE_MINUTES: u64 = 30;

pub const DEFAULT_BASE_URL: &str = "https://www.pathofexile.com";

/// Everything the worker and the façade need to know about a session
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub account: String,
    pub league: String,
    /// POESESSID cookie value, obtained by the login collaborator
    pub session_id: Option<String>,
    pub base_url: String,
    /// Root directory; the cache lives in `<root>/<account>/<league>`
    pub cache_root: PathBuf,
    pub cache_max_bytes: u64,
    pub cache_expiry_days: i64,
    pub cache_policy: CachePolicy,
    pub throttle_requests: usize,
    pub throttle_sleep: Duration,
    pub max_retries: u32,
}

impl SyncConfig {
    /// Configuration with default limits for the given account and league
    pub fn new(account: impl Into<String>, league: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            league: league.into(),
            session_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_root: default_cache_root(),
            cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
            cache_expiry_days: DEFAULT_CACHE_EXPIRY_DAYS,
            cache_policy: CachePolicy::Default,
            throttle_requests: THROTTLE_REQUESTS,
            throttle_sleep: THROTTLE_SLEEP,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Cache directory keyed by account and league
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_root
            .join(sanitize_path_component(&self.account))
            .join(sanitize_path_component(&self.league))
    }
}

/// Returns the default cache root: ~/.cache/stash_sync
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stash_sync")
}

/// Returns the default data directory: ~/.local/share/stash_sync
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stash_sync")
}

/// Keep account and league names usable as directory names
pub fn sanitize_path_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
