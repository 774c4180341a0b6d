//! Key-value persistence for snapshots, pricing maps and settings
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Persisted key/value collaborator. Implementations must be safe to share
/// between the façade and the worker thread.
pub trait DataStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write every entry or none of them
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default.to_string(),
            Err(e) => {
                log::error!("Failed to read '{}' from data store: {}", key, e);
                default.to_string()
            }
        }
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get_or(key, "").trim().parse().unwrap_or(default)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, &value.to_string())
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get_or(key, "").trim() {
            "1" | "true" => true,
            "0" | "false" => false,
            _ => default,
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "1" } else { "0" })
    }
}

/// SQLite-backed store: a single `data` table
pub struct SqliteDataStore {
    conn: Mutex<Connection>,
}

impl SqliteDataStore {
    /// Open (or create) the database file and initialise the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::info!("Created directory: {}", parent.display());
            }
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        log::info!("Opened data store: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS data (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )
}

impl DataStore for SqliteDataStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let value = conn
            .query_row(
                "SELECT value FROM data WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction()?;
        for &(key, value) in entries {
            tx.execute(
                "INSERT INTO data (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![key, value],
            )?;
            log::debug!("Stored '{}' ({} bytes)", key, value.len());
        }
        tx.commit()?;
        Ok(())
    }
}

/// Volatile store for tests and dry runs
#[derive(Default)]
pub struct MemoryDataStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataStore for MemoryDataStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        for &(key, value) in entries {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}
