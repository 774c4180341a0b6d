//! Disk-backed HTTP response cache
//!
//! The remote sends `no-store`/`must-revalidate` on every reply and offers no
//! validators, so a standard HTTP cache would never keep anything. Entries are
//! stored one JSON file per URL with the caching headers stripped and an
//! explicit expiry, and the [`CachePolicy`] decides when an entry is evicted
//! before a request goes out.

use crate::error::Result;
use crate::model::item::sha256_hex;
use crate::model::Location;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// How refresh requests are honoured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Evict when the caller asks for a refresh
    #[default]
    Default,
    /// Never evict, always prefer the cached copy
    AlwaysCache,
    /// Evict everything, every time
    NeverCache,
    /// Evict only locations the user marked for refresh
    ManualCache,
}

impl CachePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::Default => "default",
            CachePolicy::AlwaysCache => "always_cache",
            CachePolicy::NeverCache => "never_cache",
            CachePolicy::ManualCache => "manual_cache",
        }
    }

    fn should_evict(&self, flags: RefreshFlags) -> bool {
        match self {
            CachePolicy::Default => flags.refresh,
            CachePolicy::AlwaysCache => false,
            CachePolicy::NeverCache => true,
            CachePolicy::ManualCache => flags.manual_refresh,
        }
    }
}

/// Per-request refresh markers set by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshFlags {
    pub refresh: bool,
    pub manual_refresh: bool,
}

impl RefreshFlags {
    pub const NONE: RefreshFlags = RefreshFlags {
        refresh: false,
        manual_refresh: false,
    };

    /// Used for discovery requests and tabs that cannot be trusted from cache
    pub const FORCED: RefreshFlags = RefreshFlags {
        refresh: true,
        manual_refresh: true,
    };

    pub fn refresh() -> Self {
        Self {
            refresh: true,
            manual_refresh: false,
        }
    }
}

/// A reply, either fresh from the network or read back from disk
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub body: String,
    pub from_cache: bool,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    url: String,
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
    saved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

const STRIPPED_HEADERS: [&str; 2] = ["cache-control", "pragma"];

/// Response cache rooted at a per-account, per-league directory
pub struct ResponseCache {
    client: reqwest::Client,
    cache_dir: PathBuf,
    max_bytes: u64,
    expiry: Duration,
    policy: Mutex<CachePolicy>,
    // serialises writes and trimming
    write_lock: Mutex<()>,
}

impl ResponseCache {
    pub fn new(
        client: reqwest::Client,
        cache_dir: &Path,
        max_bytes: u64,
        expiry_days: i64,
        policy: CachePolicy,
    ) -> Self {
        if let Err(e) = std::fs::create_dir_all(cache_dir) {
            log::warn!("Failed to create response cache directory: {}", e);
        } else {
            log::info!("Response cache directory: {:?}", cache_dir);
        }

        Self {
            client,
            cache_dir: cache_dir.to_path_buf(),
            max_bytes,
            expiry: Duration::days(expiry_days),
            policy: Mutex::new(policy),
            write_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        *self.policy.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Switch policy; switching to `NeverCache` flushes the whole cache
    pub fn set_policy(&self, policy: CachePolicy) {
        {
            let mut current = self.policy.lock().unwrap_or_else(|e| e.into_inner());
            if *current == policy {
                return;
            }
            *current = policy;
        }
        log::info!("Cache policy set to {}", policy.as_str());
        if policy == CachePolicy::NeverCache {
            self.clear();
        }
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", sha256_hex(url)))
    }

    /// Whether an unexpired entry exists for the URL
    pub fn contains(&self, url: &str) -> bool {
        self.lookup(url).is_some()
    }

    /// Evict a single entry
    pub fn remove(&self, url: &str) {
        let path = self.entry_path(url);
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("Evicted cache entry for {}", url),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to evict cache entry for {}: {}", url, e),
        }
    }

    /// Delete every entry
    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for (path, _, _) in self.entries() {
            if std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        log::info!("Flushed {} response cache entries", removed);
    }

    fn lookup(&self, url: &str) -> Option<CacheEntry> {
        let path = self.entry_path(url);
        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Discarding unreadable cache entry for {}: {}", url, e);
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };
        if entry.url != url {
            return None;
        }
        if entry.expires_at <= Utc::now() {
            log::debug!("Cache entry for {} expired at {}", url, entry.expires_at);
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(entry)
    }

    fn store(&self, url: &str, status: u16, mut headers: BTreeMap<String, String>, body: &str) {
        let saved_at = Utc::now();
        let expires_at = saved_at + self.expiry;
        headers.retain(|name, _| !STRIPPED_HEADERS.contains(&name.as_str()));
        headers.insert("expires".to_string(), expires_at.to_rfc2822());

        let entry = CacheEntry {
            url: url.to_string(),
            status,
            headers,
            body: body.to_string(),
            saved_at,
            expires_at,
        };
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to serialize cache entry for {}: {}", url, e);
                return;
            }
        };

        let path = self.entry_path(url);
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = std::fs::write(&path, json) {
            log::warn!("Failed to cache response for {}: {}", url, e);
            return;
        }
        self.trim(&path);
    }

    fn entries(&self) -> Vec<(PathBuf, u64, SystemTime)> {
        let Ok(dir) = std::fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        dir.filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((entry.path(), meta.len(), modified))
            })
            .collect()
    }

    /// Drop oldest entries until the directory fits in `max_bytes`, never
    /// the one just written. Caller holds `write_lock`.
    fn trim(&self, keep: &Path) {
        let mut entries = self.entries();
        let mut total: u64 = entries.iter().map(|(_, size, _)| size).sum();
        if total <= self.max_bytes {
            return;
        }
        entries.sort_by_key(|(_, _, modified)| *modified);
        for (path, size, _) in entries {
            if total <= self.max_bytes {
                break;
            }
            if path == keep {
                continue;
            }
            if std::fs::remove_file(&path).is_ok() {
                total = total.saturating_sub(size);
                log::debug!("Trimmed cache entry {:?}", path);
            }
        }
    }

    /// Fetch `url` for `location`, evicting first when the policy says the
    /// flags warrant a refetch, then preferring the cached copy.
    pub async fn request(
        &self,
        url: &str,
        location: &Location,
        flags: RefreshFlags,
    ) -> Result<CachedResponse> {
        let policy = self.policy();
        if policy.should_evict(flags) {
            self.remove(url);
        }

        if let Some(entry) = self.lookup(url) {
            log::debug!("Cache hit for {}", location.header());
            return Ok(CachedResponse {
                status: entry.status,
                body: entry.body,
                from_cache: true,
            });
        }

        log::debug!("Requesting {} ({})", location.header(), url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        if status.is_success() && policy != CachePolicy::NeverCache {
            self.store(url, status.as_u16(), headers, &body);
        } else if !status.is_success() {
            log::warn!("{} returned HTTP {}", location.header(), status);
        }

        Ok(CachedResponse {
            status: status.as_u16(),
            body,
            from_cache: false,
        })
    }
}
