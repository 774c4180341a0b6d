//! Façade over the worker thread and the pricing store
//!
//! The worker runs on its own thread with a current-thread tokio runtime.
//! Commands go in and events come out over unbounded channels; every
//! refreshed snapshot is run through auto-pricing and propagation before it
//! is handed to the caller.

use crate::buyout_manager::BuyoutManager;
use crate::cache::{CachePolicy, ResponseCache};
use crate::client::build_client;
use crate::config::{SyncConfig, DEFAULT_AUTO_UPDATE_MINUTES};
use crate::data_store::DataStore;
use crate::error::{Result, SyncError};
use crate::model::{Item, Location};
use crate::worker::{ItemsManagerWorker, StatusUpdate, TabSelection, WorkerCommand, WorkerEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Bumped when the item hash scheme changes; older stores are migrated
pub const CURRENT_DB_VERSION: i64 = 4;

pub const DB_VERSION_KEY: &str = "db_version";
pub const AUTO_UPDATE_KEY: &str = "autoupdate";
pub const AUTO_UPDATE_INTERVAL_KEY: &str = "autoupdate_interval";

/// What callers observe
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A new snapshot, already priced and propagated
    ItemsRefreshed {
        items: Vec<Arc<Item>>,
        locations: Vec<Location>,
        initial: bool,
    },
    Status(StatusUpdate),
    /// An update was requested while another was running
    UpdateRejected,
}

enum Wake {
    Event(Option<WorkerEvent>),
    AutoUpdate,
}

pub struct ItemsManager {
    data: Arc<dyn DataStore>,
    buyouts: BuyoutManager,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    worker: Option<JoinHandle<()>>,
    items: Vec<Arc<Item>>,
    locations: Vec<Location>,
    auto_update: bool,
    auto_update_interval: Duration,
    timer: Option<Interval>,
}

impl ItemsManager {
    /// Load the pricing store and settings, then start the worker thread
    pub fn start(config: SyncConfig, data: Arc<dyn DataStore>) -> Result<Self> {
        let client = build_client(config.session_id.as_deref())?;
        let cache = Arc::new(ResponseCache::new(
            client,
            &config.cache_dir(),
            config.cache_max_bytes,
            config.cache_expiry_days,
            config.cache_policy,
        ));

        let mut buyouts = BuyoutManager::new(Arc::clone(&data));
        buyouts.load()?;

        let auto_update = data.get_bool(AUTO_UPDATE_KEY, true);
        let minutes = data.get_int(AUTO_UPDATE_INTERVAL_KEY, DEFAULT_AUTO_UPDATE_MINUTES as i64);
        let minutes = if minutes > 0 {
            minutes as u64
        } else {
            DEFAULT_AUTO_UPDATE_MINUTES
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = ItemsManagerWorker::new(config, cache, Arc::clone(&data), command_rx, event_tx);

        let handle = std::thread::Builder::new()
            .name("items-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        log::error!("Failed to start worker runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(worker.run());
            })?;

        Ok(Self {
            data,
            buyouts,
            commands: command_tx,
            events: event_rx,
            worker: Some(handle),
            items: Vec::new(),
            locations: Vec::new(),
            auto_update,
            auto_update_interval: Duration::from_secs(minutes * 60),
            timer: None,
        })
    }

    fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::WorkerGone)
    }

    /// Ask the worker to load the persisted snapshot
    pub fn init(&self) -> Result<()> {
        self.send(WorkerCommand::Init)
    }

    /// Start a synchronization run
    pub fn update(&self, selection: TabSelection, locations: Vec<Location>) -> Result<()> {
        let unchecked: HashSet<String> = self
            .locations
            .iter()
            .filter(|location| !self.buyouts.get_refresh_checked(location))
            .map(Location::unique_hash)
            .collect();
        log::info!(
            "Requesting update ({:?}, {} locations not refresh-checked)",
            selection,
            unchecked.len()
        );
        self.send(WorkerCommand::Update {
            selection,
            locations,
            unchecked,
        })
    }

    pub fn set_cache_policy(&self, policy: CachePolicy) -> Result<()> {
        self.send(WorkerCommand::SetCachePolicy(policy))
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn auto_update_interval(&self) -> Duration {
        self.auto_update_interval
    }

    pub fn set_auto_update(&mut self, enabled: bool) -> Result<()> {
        self.data.set_bool(AUTO_UPDATE_KEY, enabled)?;
        self.auto_update = enabled;
        self.timer = None;
        Ok(())
    }

    pub fn set_auto_update_interval(&mut self, minutes: u64) -> Result<()> {
        let minutes = minutes.max(1);
        self.data.set_int(AUTO_UPDATE_INTERVAL_KEY, minutes as i64)?;
        self.auto_update_interval = Duration::from_secs(minutes * 60);
        self.timer = None;
        Ok(())
    }

    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn buyouts(&self) -> &BuyoutManager {
        &self.buyouts
    }

    pub fn buyouts_mut(&mut self) -> &mut BuyoutManager {
        &mut self.buyouts
    }

    /// Wait for the next worker event or auto-update tick.
    ///
    /// Returns `None` once the worker has stopped.
    pub async fn next_event(&mut self) -> Option<ManagerEvent> {
        loop {
            if self.auto_update && self.timer.is_none() {
                let period = self.auto_update_interval;
                let mut timer = interval_at(Instant::now() + period, period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.timer = Some(timer);
            }

            let wake = match self.timer.as_mut() {
                Some(timer) => tokio::select! {
                    event = self.events.recv() => Wake::Event(event),
                    _ = timer.tick() => Wake::AutoUpdate,
                },
                None => Wake::Event(self.events.recv().await),
            };

            match wake {
                Wake::AutoUpdate => {
                    log::info!("Auto-update triggered");
                    if let Err(e) = self.update(TabSelection::Checked, Vec::new()) {
                        log::error!("Auto-update failed: {}", e);
                    }
                }
                Wake::Event(None) => return None,
                Wake::Event(Some(event)) => return Some(self.handle_event(event)),
            }
        }
    }

    fn handle_event(&mut self, event: WorkerEvent) -> ManagerEvent {
        match event {
            WorkerEvent::ItemsRefreshed {
                items,
                locations,
                initial,
            } => {
                self.on_items_refreshed(items, locations, initial);
                ManagerEvent::ItemsRefreshed {
                    items: self.items.clone(),
                    locations: self.locations.clone(),
                    initial,
                }
            }
            WorkerEvent::Status(status) => ManagerEvent::Status(status),
            WorkerEvent::AlreadyUpdating => ManagerEvent::UpdateRejected,
        }
    }

    fn on_items_refreshed(&mut self, items: Vec<Arc<Item>>, locations: Vec<Location>, initial: bool) {
        self.items = items;
        self.locations = locations;

        if initial {
            self.migrate_if_needed();
        }

        self.apply_auto_tab_buyouts();
        self.apply_auto_item_buyouts();
        self.buyouts.propagate(&self.items);
        if let Err(e) = self.buyouts.save() {
            log::error!("Failed to save buyouts: {}", e);
        }
        log::info!(
            "Snapshot has {} items in {} locations",
            self.items.len(),
            self.locations.len()
        );
    }

    fn migrate_if_needed(&mut self) {
        let version = self.data.get_int(DB_VERSION_KEY, 0);
        if version >= CURRENT_DB_VERSION {
            return;
        }
        log::info!(
            "Migrating item buyouts from version {} to {}",
            version,
            CURRENT_DB_VERSION
        );
        for item in &self.items {
            self.buyouts.migrate_item(item);
        }
        if let Err(e) = self.data.set_int(DB_VERSION_KEY, CURRENT_DB_VERSION) {
            log::error!("Failed to record database version: {}", e);
        }
    }

    /// Tabs named like a price note (`~price 5 chaos`) price the whole tab
    fn apply_auto_tab_buyouts(&mut self) {
        for location in &self.locations {
            let Some(label) = location.tab_label() else {
                continue;
            };
            let buyout = BuyoutManager::string_to_buyout(label);
            if buyout.is_active() {
                self.buyouts.set_tab(location, buyout);
            }
        }
        // nothing is known yet; keep what was persisted
        if !self.locations.is_empty() {
            self.buyouts.compress_tab_buyouts(&self.locations);
        }
    }

    fn apply_auto_item_buyouts(&mut self) {
        for item in &self.items {
            let Some(note) = item.note() else {
                continue;
            };
            let buyout = BuyoutManager::string_to_buyout(note);
            if !buyout.is_inherited() {
                self.buyouts.set(item, buyout);
            }
        }
        if !self.locations.is_empty() {
            self.buyouts.compress_item_buyouts(&self.items);
        }
    }

    /// Stop the worker and wait for its thread to finish
    pub fn shutdown(mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Items worker thread panicked");
            }
        }
    }
}

impl Drop for ItemsManager {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.commands.send(WorkerCommand::Shutdown);
        }
    }
}
