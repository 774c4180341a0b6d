//! Stash Sync - command line entry point
//!
//! Loads the last snapshot, then synchronizes once or keeps running with the
//! persisted auto-update interval.

use clap::Parser;
use stash_sync::config::{default_cache_root, default_data_dir, DEFAULT_BASE_URL};
use stash_sync::{
    CachePolicy, ItemsManager, ManagerEvent, ProgressState, SqliteDataStore, SyncConfig,
    TabSelection,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Synchronize stash tabs and character inventories into a local snapshot
#[derive(Parser, Debug)]
#[command(name = "stash_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Account name
    #[arg(short, long)]
    account: String,

    /// League to synchronize
    #[arg(short, long, default_value = "Standard")]
    league: String,

    /// Session cookie value
    #[arg(long, env = "POESESSID", hide_env_values = true)]
    session_id: Option<String>,

    /// Directory holding the SQLite data store
    #[arg(long, default_value_os_t = default_data_dir())]
    data_dir: PathBuf,

    /// Root directory for the response cache
    #[arg(long, default_value_os_t = default_cache_root())]
    cache_dir: PathBuf,

    /// How refresh requests are honoured by the cache
    #[arg(long, value_enum, default_value_t = CachePolicy::Default)]
    cache_policy: CachePolicy,

    /// Which locations bypass the cache
    #[arg(long, value_enum, default_value_t = TabSelection::All)]
    selection: TabSelection,

    /// Run one update and exit (default: keep running with auto-update)
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Override and persist the auto-update interval in minutes
    #[arg(long)]
    interval_minutes: Option<u64>,

    /// Base URL of the remote service
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = args.data_dir.join("stash_sync.db");

    log::info!("Starting stash_sync for {} in {}", args.account, args.league);
    log::info!("Database path: {}", db_path.display());

    let data = match SqliteDataStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let mut config = SyncConfig::new(args.account.as_str(), args.league.as_str());
    config.session_id = args.session_id.clone();
    config.base_url = args.base_url.clone();
    config.cache_root = args.cache_dir.clone();
    config.cache_policy = args.cache_policy;

    let mut manager = match ItemsManager::start(config, data) {
        Ok(manager) => manager,
        Err(e) => {
            log::error!("Failed to start items manager: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(minutes) = args.interval_minutes {
        if let Err(e) = manager.set_auto_update_interval(minutes) {
            log::warn!("Failed to store auto-update interval: {}", e);
        }
    }
    if args.once {
        if let Err(e) = manager.set_auto_update(false) {
            log::warn!("Failed to disable auto-update: {}", e);
        }
    } else {
        log::info!(
            "Running in daemon mode, updating every {} minute(s)",
            manager.auto_update_interval().as_secs() / 60
        );
    }

    let started = manager.init().and_then(|_| manager.update(args.selection, Vec::new()));
    if let Err(e) = started {
        log::error!("Failed to start update: {}", e);
        std::process::exit(1);
    }

    let exit_code = run(&mut manager, args.once).await;
    tokio::task::spawn_blocking(move || manager.shutdown())
        .await
        .unwrap_or_else(|e| log::error!("Failed to stop items worker: {}", e));
    std::process::exit(exit_code);
}

/// Report events until the single update finishes (with `once`) or ctrl-c
async fn run(manager: &mut ItemsManager, once: bool) -> i32 {
    loop {
        let event = tokio::select! {
            event = manager.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                return 0;
            }
        };

        match event {
            None => {
                log::error!("Items worker stopped unexpectedly");
                return 1;
            }
            Some(ManagerEvent::ItemsRefreshed {
                items,
                locations,
                initial,
            }) => {
                let priced = items
                    .iter()
                    .filter(|item| manager.buyouts().get(item).is_active())
                    .count();
                log::info!(
                    "{} snapshot: {} items ({} priced) in {} locations",
                    if initial { "Stored" } else { "Refreshed" },
                    items.len(),
                    priced,
                    locations.len()
                );
                if once && !initial {
                    return 0;
                }
            }
            Some(ManagerEvent::Status(status)) => match status.state {
                ProgressState::ItemsReceive => {
                    log::debug!(
                        "Received {}/{} ({} cached)",
                        status.progress,
                        status.total,
                        status.cached
                    )
                }
                ProgressState::ItemsPaused => log::info!(
                    "Throttled at {}/{}, waiting before the next batch",
                    status.progress,
                    status.total
                ),
                ProgressState::ItemsComplete => log::info!("Update complete"),
                ProgressState::UpdateCancelled => {
                    log::warn!(
                        "Update cancelled: {}",
                        status.message.as_deref().unwrap_or("unknown reason")
                    );
                    if once {
                        return 1;
                    }
                }
            },
            Some(ManagerEvent::UpdateRejected) => log::warn!("An update is already running"),
        }
    }
}
