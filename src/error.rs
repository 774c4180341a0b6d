//! Error types for stash_sync

use thiserror::Error;

/// Unified error type for stash_sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failed to parse JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Data store operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// File I/O error (response cache)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Reply body was not the JSON shape we expected
    #[error("Malformed reply: {0}")]
    MalformedReply(String),
    /// Reply carried an `error` member
    #[error("Server reported an error: {0}")]
    RemoteError(String),
    /// Character list had no character in the configured league
    #[error("No characters found in league {0}")]
    NoCharacters(String),
    /// Seed fetch returned an empty tab list
    #[error("No stash tabs found")]
    NoTabs,
    /// Seed tab fetch failed, nothing to build the run from
    #[error("Failed to fetch first stash tab: {0}")]
    SeedFailed(String),
    /// Tabs were renamed or reordered while the update was running
    #[error("Tab list changed during update: {0}")]
    TabsChanged(String),
    /// A request kept failing
    #[error("Request for {location} failed {attempts} times")]
    RetriesExhausted { location: String, attempts: u32 },
    /// A synchronization run is already in flight
    #[error("An update is already running")]
    AlreadyUpdating,
    /// The worker thread is no longer running
    #[error("Items worker is not running")]
    WorkerGone,
}

/// Result alias for stash_sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
