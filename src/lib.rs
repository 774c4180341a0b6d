//! Stash Sync - remote stash and character inventory synchronization
//!
//! Fetches every stash tab and character inventory from a rate-limited web
//! API into a local snapshot, keeping user-entered prices attached to items
//! and tabs across renames, moves and partial failures.

pub mod buyout_manager;
pub mod cache;
pub mod client;
pub mod config;
pub mod data_store;
pub mod error;
pub mod items_manager;
pub mod model;
pub mod worker;

pub use buyout_manager::BuyoutManager;
pub use cache::{CachePolicy, CachedResponse, RefreshFlags, ResponseCache};
pub use config::SyncConfig;
pub use data_store::{DataStore, MemoryDataStore, SqliteDataStore};
pub use error::{Result, SyncError};
pub use items_manager::{ItemsManager, ManagerEvent};
pub use model::{Buyout, BuyoutSource, BuyoutType, Currency, Item, Location};
pub use worker::{
    ItemsManagerWorker, ProgressState, RunSummary, StatusUpdate, TabSelection, WorkerCommand,
    WorkerEvent, WorkerState,
};
