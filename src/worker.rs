//! Fetch orchestrator
//!
//! Runs discovery (main page, character list, seed tab with the tab index)
//! and then a throttled fan-out over every stash tab and character. Replies
//! are processed one at a time from a `JoinSet`, so the queue, reply table
//! and item buffer need no locking. Commands arriving while a run is in
//! flight are serviced between replies.

use crate::cache::{CachePolicy, CachedResponse, RefreshFlags, ResponseCache};
use crate::client::{extract_selected_character, parse_character_list, Endpoints};
use crate::config::SyncConfig;
use crate::data_store::DataStore;
use crate::error::{Result, SyncError};
use crate::model::{parse_tabs, Item, Location, TabInfo, TabSignature};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const ITEMS_KEY: &str = "items";
pub const TABS_KEY: &str = "tabs";
pub const CHARACTERS_KEY: &str = "characters";

/// Which locations bypass the cache for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TabSelection {
    /// Refresh everything
    All,
    /// Refresh locations the pricing store reports as refresh-checked
    #[default]
    Checked,
    /// Refresh only the explicitly selected locations
    Selected,
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    FetchingMainPage,
    FetchingCharacterList,
    FetchingFirstTab,
    FetchingRemainingTabs,
    Completed,
    Cancelled,
}

impl WorkerState {
    pub fn is_updating(&self) -> bool {
        matches!(
            self,
            WorkerState::FetchingMainPage
                | WorkerState::FetchingCharacterList
                | WorkerState::FetchingFirstTab
                | WorkerState::FetchingRemainingTabs
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    ItemsReceive,
    ItemsPaused,
    ItemsComplete,
    UpdateCancelled,
}

/// Progress report for status display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub state: ProgressState,
    pub progress: usize,
    pub total: usize,
    pub cached: usize,
    pub message: Option<String>,
}

/// Commands accepted by the worker
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    Init,
    Update {
        selection: TabSelection,
        locations: Vec<Location>,
        /// Unique hashes of locations that are not refresh-checked
        unchecked: HashSet<String>,
    },
    SetCachePolicy(CachePolicy),
    Shutdown,
}

/// Events emitted by the worker
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Status(StatusUpdate),
    ItemsRefreshed {
        items: Vec<Arc<Item>>,
        locations: Vec<Location>,
        initial: bool,
    },
    /// An update was requested while one was already running
    AlreadyUpdating,
}

/// Counters for a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub items: usize,
    pub locations: usize,
    pub batches: usize,
    pub pauses: usize,
    /// Item requests answered by the network
    pub requests: usize,
    /// Item requests answered from the cache
    pub cache_hits: usize,
    /// Tabs refetched because their header was not known from the last run
    pub forced_refreshes: usize,
}

#[derive(Debug, Clone)]
struct ItemsRequest {
    id: u64,
    location: Location,
    url: String,
    flags: RefreshFlags,
    attempts: u32,
}

struct ItemsReply {
    id: u64,
    result: Result<CachedResponse>,
}

/// Transient state of one run; dropped when the run ends
#[derive(Default)]
struct RunState {
    next_id: u64,
    queue: VecDeque<ItemsRequest>,
    replies: HashMap<u64, ItemsRequest>,
    in_flight: JoinSet<ItemsReply>,
    items: Vec<Item>,
    tabs: Vec<TabInfo>,
    tabs_json: Value,
    characters: Vec<String>,
    signature: TabSignature,
    selected_character: Option<String>,
    requests_needed: usize,
    requests_completed: usize,
    cached_requests_completed: usize,
    total_needed: usize,
    total_completed: usize,
    total_cached: usize,
    cancelled: Option<SyncError>,
    stats: RunSummary,
}

impl RunState {
    fn enqueue(&mut self, location: Location, url: String, flags: RefreshFlags) {
        let id = self.take_id();
        self.queue.push_back(ItemsRequest {
            id,
            location,
            url,
            flags,
            attempts: 0,
        });
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn cancel(&mut self, error: SyncError) {
        if self.cancelled.is_none() {
            log::error!("Cancelling update: {}", error);
            self.cancelled = Some(error);
        }
    }

    fn locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self
            .tabs
            .iter()
            .filter(|tab| !tab.hidden)
            .map(TabInfo::location)
            .collect();
        locations.extend(self.characters.iter().map(Location::character));
        locations
    }
}

pub struct ItemsManagerWorker {
    config: SyncConfig,
    endpoints: Endpoints,
    cache: Arc<ResponseCache>,
    data: Arc<dyn DataStore>,
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    state: WorkerState,
    accepting_commands: bool,
    shutdown_requested: bool,
    /// Headers of the locations seen by the last completed run
    known_headers: HashSet<String>,
    known_locations: Vec<Location>,
}

impl ItemsManagerWorker {
    pub fn new(
        config: SyncConfig,
        cache: Arc<ResponseCache>,
        data: Arc<dyn DataStore>,
        commands: mpsc::UnboundedReceiver<WorkerCommand>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            endpoints: Endpoints::new(&config.base_url),
            config,
            cache,
            data,
            commands,
            events,
            state: WorkerState::Idle,
            accepting_commands: true,
            shutdown_requested: false,
            known_headers: HashSet::new(),
            known_locations: Vec::new(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Serve commands until shutdown or until every sender is gone
    pub async fn run(mut self) {
        log::info!(
            "Items worker started for {} in {}",
            self.config.account,
            self.config.league
        );
        while let Some(command) = self.commands.recv().await {
            match command {
                WorkerCommand::Init => {
                    if let Err(e) = self.init() {
                        log::error!("Failed to load persisted items: {}", e);
                    }
                }
                WorkerCommand::Update {
                    selection,
                    locations,
                    unchecked,
                } => match self.update(selection, &locations, &unchecked).await {
                    Ok(summary) => log::info!("Update finished: {:?}", summary),
                    Err(e) => log::warn!("Update did not complete: {}", e),
                },
                WorkerCommand::SetCachePolicy(policy) => self.cache.set_policy(policy),
                WorkerCommand::Shutdown => self.shutdown_requested = true,
            }
            if self.shutdown_requested {
                break;
            }
        }
        log::info!("Items worker stopped");
    }

    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Dropping worker event, nobody is listening");
        }
    }

    fn emit_status(&self, state: ProgressState, run: &RunState, message: Option<String>) {
        self.emit(WorkerEvent::Status(StatusUpdate {
            state,
            progress: run.total_completed,
            total: run.total_needed,
            cached: run.total_cached,
            message,
        }));
    }

    /// Load the last persisted snapshot and announce it
    pub fn init(&mut self) -> Result<()> {
        let items: Vec<Arc<Item>> = match self.data.get(ITEMS_KEY)? {
            Some(json) => match serde_json::from_str::<Value>(&json)? {
                Value::Array(values) => values
                    .into_iter()
                    .filter_map(|value| match Item::from_persisted(value) {
                        Ok(item) => Some(Arc::new(item)),
                        Err(e) => {
                            log::warn!("Skipping persisted item: {}", e);
                            None
                        }
                    })
                    .collect(),
                _ => {
                    log::warn!("Persisted items are not an array, ignoring");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut locations: Vec<Location> = match self.data.get(TABS_KEY)? {
            Some(json) => {
                let value: Value = serde_json::from_str(&json)?;
                parse_tabs(&value)?
                    .iter()
                    .filter(|tab| !tab.hidden)
                    .map(TabInfo::location)
                    .collect()
            }
            None => Vec::new(),
        };
        if let Some(json) = self.data.get(CHARACTERS_KEY)? {
            let names: Vec<String> = serde_json::from_str(&json)?;
            locations.extend(names.iter().map(Location::character));
        }

        log::info!(
            "Loaded {} items in {} locations from storage",
            items.len(),
            locations.len()
        );
        self.remember_locations(&locations);
        self.emit(WorkerEvent::ItemsRefreshed {
            items,
            locations,
            initial: true,
        });
        Ok(())
    }

    fn remember_locations(&mut self, locations: &[Location]) {
        self.known_headers = locations.iter().map(Location::header).collect();
        self.known_locations = locations.to_vec();
    }

    /// Handle a command that arrives while a run is in flight
    fn handle_busy_command(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::Update { .. } => {
                log::warn!("Update requested while an update is already running");
                self.emit(WorkerEvent::AlreadyUpdating);
            }
            WorkerCommand::SetCachePolicy(policy) => self.cache.set_policy(policy),
            WorkerCommand::Init => log::warn!("Ignoring init while an update is running"),
            WorkerCommand::Shutdown => {
                log::info!("Shutdown requested during update");
                self.shutdown_requested = true;
            }
        }
    }

    /// Await `fut` while still servicing incoming commands
    async fn interruptible<F: Future>(&mut self, fut: F) -> F::Output {
        tokio::pin!(fut);
        loop {
            let command = tokio::select! {
                biased;
                output = &mut fut => return output,
                command = self.commands.recv(), if self.accepting_commands => command,
            };
            match command {
                Some(command) => self.handle_busy_command(command),
                None => self.accepting_commands = false,
            }
        }
    }

    fn fetch(
        &self,
        url: String,
        location: Location,
        flags: RefreshFlags,
    ) -> impl Future<Output = Result<CachedResponse>> + Send + 'static {
        let cache = Arc::clone(&self.cache);
        async move { cache.request(&url, &location, flags).await }
    }

    fn account_location(&self) -> Location {
        Location::character(self.config.account.as_str())
    }

    /// Run one full synchronization
    pub async fn update(
        &mut self,
        selection: TabSelection,
        selected: &[Location],
        unchecked: &HashSet<String>,
    ) -> Result<RunSummary> {
        if self.state.is_updating() {
            self.emit(WorkerEvent::AlreadyUpdating);
            return Err(SyncError::AlreadyUpdating);
        }
        log::info!("Starting update ({:?})", selection);
        let mut run = RunState::default();

        self.state = WorkerState::FetchingMainPage;
        let main_page = self.fetch(
            self.endpoints.main_page(),
            self.account_location(),
            RefreshFlags::FORCED,
        );
        match self.interruptible(main_page).await {
            Ok(response) => {
                run.selected_character = extract_selected_character(&response.body);
                match &run.selected_character {
                    Some(name) => log::info!("Active character: {}", name),
                    None => log::warn!("Could not find the active character on the main page"),
                }
            }
            Err(e) => log::warn!("Failed to fetch main page: {}", e),
        }
        if self.shutdown_requested {
            return self.abort(run, SyncError::WorkerGone);
        }

        self.state = WorkerState::FetchingCharacterList;
        let character_list = self.fetch(
            self.endpoints.characters(&self.config.account),
            self.account_location(),
            RefreshFlags::FORCED,
        );
        let characters = self
            .interruptible(character_list)
            .await
            .and_then(|response| {
                if !response.is_success() {
                    return Err(http_error(response.status));
                }
                parse_character_list(&response.body, &self.config.league)
            });
        let characters = match characters {
            Ok(names) => names,
            Err(e) => return self.abort(run, e),
        };
        log::info!("Found {} characters in {}", characters.len(), self.config.league);
        for name in &characters {
            let location = Location::character(name.as_str());
            let url = self
                .endpoints
                .character_items(&self.config.account, name);
            let flags = refresh_flags(&location, selection, selected, unchecked);
            run.enqueue(location, url, flags);
        }
        run.characters = characters;
        if self.shutdown_requested {
            return self.abort(run, SyncError::WorkerGone);
        }

        self.state = WorkerState::FetchingFirstTab;
        if let Err(e) = self.fetch_first_tab(&mut run, selection, selected, unchecked).await {
            return self.abort(run, e);
        }
        if self.shutdown_requested {
            return self.abort(run, SyncError::WorkerGone);
        }

        self.state = WorkerState::FetchingRemainingTabs;
        run.total_needed = run.queue.len() + 1;
        run.total_completed = 1;
        self.emit_status(ProgressState::ItemsReceive, &run, None);
        let first_batch = self.config.throttle_requests.saturating_sub(1).max(1);
        self.dispatch(&mut run, first_batch);
        self.fan_out(&mut run).await;

        if let Some(error) = run.cancelled.take() {
            return self.abort(run, error);
        }
        self.complete(run)
    }

    fn seed_index(
        &self,
        selection: TabSelection,
        selected: &[Location],
        unchecked: &HashSet<String>,
    ) -> usize {
        let candidate = match selection {
            TabSelection::Checked => self
                .known_locations
                .iter()
                .find(|loc| loc.is_stash() && !unchecked.contains(&loc.unique_hash())),
            TabSelection::Selected => selected.iter().find(|loc| loc.is_stash()),
            TabSelection::All => None,
        };
        candidate.and_then(Location::tab_index).unwrap_or(1)
    }

    async fn fetch_first_tab(
        &mut self,
        run: &mut RunState,
        selection: TabSelection,
        selected: &[Location],
        unchecked: &HashSet<String>,
    ) -> Result<()> {
        let index = self.seed_index(selection, selected, unchecked);
        let url = self.endpoints.stash_items(
            &self.config.account,
            &self.config.league,
            index,
            true,
        );
        // the signature every live reply is checked against must be current,
        // whatever the cache policy
        self.cache.remove(&url);
        let seed = self.fetch(url, Location::stash(index, ""), RefreshFlags::FORCED);
        let response = self
            .interruptible(seed)
            .await
            .map_err(|e| SyncError::SeedFailed(e.to_string()))?;
        if response.from_cache {
            run.stats.cache_hits += 1;
            run.total_cached += 1;
        } else {
            run.stats.requests += 1;
        }
        let doc = parse_reply(&response).map_err(|e| SyncError::SeedFailed(e.to_string()))?;

        let tabs_json = doc.get("tabs").cloned().ok_or(SyncError::NoTabs)?;
        let tabs = parse_tabs(&tabs_json)?;
        if tabs.is_empty() {
            return Err(SyncError::NoTabs);
        }
        run.signature = TabSignature::from_tabs(&tabs);
        log::info!("Found {} stash tabs", tabs.len());

        let seed_visible = tabs.iter().any(|tab| tab.index == index && !tab.hidden);
        for tab in tabs.iter().filter(|tab| !tab.hidden) {
            let location = tab.location();
            if seed_visible && tab.index == index {
                let items = Item::parse_all(doc.get("items").unwrap_or(&Value::Null), &location);
                run.items.extend(items);
                continue;
            }
            let mut flags = refresh_flags(&location, selection, selected, unchecked);
            if !self.known_headers.contains(&location.header()) {
                log::debug!("Tab {} is new or moved, forcing refresh", location.header());
                flags = RefreshFlags::FORCED;
                run.stats.forced_refreshes += 1;
            }
            let url = self.endpoints.stash_items(
                &self.config.account,
                &self.config.league,
                tab.index,
                true,
            );
            run.enqueue(location, url, flags);
        }
        if !seed_visible {
            log::debug!("Seed tab {} is not visible, discarding its items", index);
        }

        run.tabs = tabs;
        run.tabs_json = tabs_json;
        Ok(())
    }

    fn dispatch(&self, run: &mut RunState, limit: usize) {
        run.requests_needed = 0;
        run.requests_completed = 0;
        run.cached_requests_completed = 0;
        while run.requests_needed < limit {
            let Some(request) = run.queue.pop_front() else {
                break;
            };
            let id = request.id;
            let fetch = self.fetch(
                request.url.clone(),
                request.location.clone(),
                request.flags,
            );
            run.replies.insert(id, request);
            run.in_flight.spawn(async move {
                ItemsReply {
                    id,
                    result: fetch.await,
                }
            });
            run.requests_needed += 1;
        }
        if run.requests_needed > 0 {
            run.stats.batches += 1;
            log::debug!(
                "Dispatched {} requests, {} queued",
                run.requests_needed,
                run.queue.len()
            );
        }
    }

    async fn fan_out(&mut self, run: &mut RunState) {
        loop {
            while let Some(joined) = self.interruptible(run.in_flight.join_next()).await {
                match joined {
                    Ok(reply) => self.on_reply(run, reply),
                    Err(e) => run.cancel(SyncError::MalformedReply(format!(
                        "request task failed: {}",
                        e
                    ))),
                }
                if self.shutdown_requested {
                    run.cancel(SyncError::WorkerGone);
                }
            }

            if run.cancelled.is_some() || run.queue.is_empty() {
                return;
            }

            let cached = run.cached_requests_completed;
            if cached > 0 {
                self.dispatch(run, cached);
                continue;
            }

            log::info!(
                "Throttling: {} requests queued, pausing for {:?}",
                run.queue.len(),
                self.config.throttle_sleep
            );
            self.emit_status(ProgressState::ItemsPaused, run, None);
            run.stats.pauses += 1;
            self.interruptible(tokio::time::sleep(self.config.throttle_sleep))
                .await;
            if self.shutdown_requested {
                run.cancel(SyncError::WorkerGone);
                return;
            }
            self.dispatch(run, self.config.throttle_requests.max(1));
        }
    }

    fn on_reply(&mut self, run: &mut RunState, reply: ItemsReply) {
        let Some(request) = run.replies.remove(&reply.id) else {
            log::warn!("Reply for unknown request {}", reply.id);
            return;
        };
        run.requests_completed += 1;

        let response = match reply.result {
            Ok(response) => response,
            Err(e) => {
                if run.cancelled.is_none() {
                    self.requeue(run, request, &e.to_string());
                }
                return;
            }
        };
        if response.from_cache {
            run.cached_requests_completed += 1;
            run.total_cached += 1;
            run.stats.cache_hits += 1;
        } else {
            run.stats.requests += 1;
        }

        // in-flight replies drain without effect once cancelled
        if run.cancelled.is_some() {
            return;
        }

        let doc = match parse_reply(&response) {
            Ok(doc) => doc,
            Err(e) => {
                self.requeue(run, request, &e.to_string());
                return;
            }
        };

        if let Some(index) = request.location.tab_index() {
            let reply_signature = doc.get("tabs").map(TabSignature::from_value);
            let consistent = match &reply_signature {
                Some(signature) if response.from_cache => run.signature.matches_at(signature, index),
                Some(signature) => *signature == run.signature,
                None => false,
            };
            if !consistent {
                if response.from_cache {
                    self.requeue(run, request, "cached tab list does not match");
                } else {
                    let reason = match &reply_signature {
                        Some(signature) => run.signature.describe_mismatch(signature),
                        None => format!("reply for {} has no tab list", request.location.header()),
                    };
                    run.cancel(SyncError::TabsChanged(reason));
                }
                return;
            }
        }

        let items = Item::parse_all(doc.get("items").unwrap_or(&Value::Null), &request.location);
        log::debug!(
            "Received {} items from {}",
            items.len(),
            request.location.header()
        );
        run.items.extend(items);
        run.total_completed += 1;
        self.emit_status(ProgressState::ItemsReceive, run, None);
    }

    /// Evict the cached reply and put the request back at the end of the queue
    fn requeue(&self, run: &mut RunState, mut request: ItemsRequest, reason: &str) {
        self.cache.remove(&request.url);
        request.attempts += 1;
        if request.attempts > self.config.max_retries {
            run.cancel(SyncError::RetriesExhausted {
                location: request.location.header(),
                attempts: request.attempts,
            });
            return;
        }
        log::warn!(
            "Retrying {} (attempt {}): {}",
            request.location.header(),
            request.attempts + 1,
            reason
        );
        request.id = run.take_id();
        run.queue.push_back(request);
    }

    fn abort(&mut self, run: RunState, error: SyncError) -> Result<RunSummary> {
        log::error!("Update cancelled: {}", error);
        self.state = WorkerState::Cancelled;
        self.emit_status(
            ProgressState::UpdateCancelled,
            &run,
            Some(error.to_string()),
        );
        Err(error)
    }

    /// Replace the stored snapshot in one write
    fn persist(&self, items: &[Arc<Item>], run: &RunState) -> Result<()> {
        let values: Vec<&Value> = items.iter().map(|item| item.json()).collect();
        let items_json = serde_json::to_string(&values)?;
        let tabs_json = serde_json::to_string(&run.tabs_json)?;
        let characters_json = serde_json::to_string(&run.characters)?;
        self.data.set_many(&[
            (ITEMS_KEY, items_json.as_str()),
            (TABS_KEY, tabs_json.as_str()),
            (CHARACTERS_KEY, characters_json.as_str()),
        ])
    }

    fn complete(&mut self, mut run: RunState) -> Result<RunSummary> {
        let mut items = std::mem::take(&mut run.items);
        items.sort_by(Item::snapshot_cmp);
        let items: Vec<Arc<Item>> = items.into_iter().map(Arc::new).collect();
        let locations = run.locations();

        if let Err(e) = self.persist(&items, &run) {
            return self.abort(run, e);
        }

        let mut summary = run.stats.clone();
        summary.items = items.len();
        summary.locations = locations.len();
        log::info!(
            "Received {} items in {} locations ({} live requests, {} cache hits)",
            summary.items,
            summary.locations,
            summary.requests,
            summary.cache_hits
        );

        self.remember_locations(&locations);
        self.state = WorkerState::Completed;
        self.emit(WorkerEvent::ItemsRefreshed {
            items,
            locations,
            initial: false,
        });
        self.emit_status(ProgressState::ItemsComplete, &run, None);
        self.preserve_selected_character(&run);
        Ok(summary)
    }

    /// Request the active character once more so it stays the selected one
    fn preserve_selected_character(&self, run: &RunState) {
        let Some(name) = run.selected_character.clone() else {
            return;
        };
        let throttle = self.config.throttle_requests.max(1);
        let delay = if run.stats.requests > 0 && run.stats.requests % throttle == 0 {
            self.config.throttle_sleep
        } else {
            Duration::ZERO
        };
        let url = self.endpoints.character_items(&self.config.account, &name);
        let fetch = self.fetch(url, Location::character(name), RefreshFlags::FORCED);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = fetch.await {
                log::warn!("Failed to refresh the active character: {}", e);
            }
        });
    }
}

fn refresh_flags(
    location: &Location,
    selection: TabSelection,
    selected: &[Location],
    unchecked: &HashSet<String>,
) -> RefreshFlags {
    match selection {
        TabSelection::All => RefreshFlags::refresh(),
        TabSelection::Checked => {
            if unchecked.contains(&location.unique_hash()) {
                RefreshFlags::NONE
            } else {
                RefreshFlags::refresh()
            }
        }
        TabSelection::Selected => {
            let header = location.header();
            if selected.iter().any(|loc| loc.header() == header) {
                RefreshFlags::FORCED
            } else {
                RefreshFlags::NONE
            }
        }
    }
}

fn http_error(status: u16) -> SyncError {
    match reqwest::StatusCode::from_u16(status) {
        Ok(code) => SyncError::HttpStatus(code),
        Err(_) => SyncError::MalformedReply(format!("invalid HTTP status {}", status)),
    }
}

/// Body of a successful object reply; error-flagged replies are errors
fn parse_reply(response: &CachedResponse) -> Result<Value> {
    if !response.is_success() {
        return Err(http_error(response.status));
    }
    let doc: Value = serde_json::from_str(&response.body)?;
    if !doc.is_object() {
        return Err(SyncError::MalformedReply(
            "reply is not a JSON object".to_string(),
        ));
    }
    if let Some(error) = doc.get("error") {
        return Err(SyncError::RemoteError(error.to_string()));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> CachedResponse {
        CachedResponse {
            status,
            body: body.to_string(),
            from_cache: false,
        }
    }

    #[test]
    fn parse_reply_classifies_bodies() {
        assert!(parse_reply(&response(200, r#"{"items": []}"#)).is_ok());
        assert!(matches!(
            parse_reply(&response(200, "[]")),
            Err(SyncError::MalformedReply(_))
        ));
        assert!(matches!(
            parse_reply(&response(200, r#"{"error": {"code": 1}}"#)),
            Err(SyncError::RemoteError(_))
        ));
        assert!(matches!(
            parse_reply(&response(429, "{}")),
            Err(SyncError::HttpStatus(_))
        ));
        assert!(matches!(
            parse_reply(&response(200, "<html>")),
            Err(SyncError::Parse(_))
        ));
    }

    #[test]
    fn refresh_flags_follow_selection() {
        let tab = Location::stash(2, "Maps");
        let other = Location::stash(3, "Dump");
        let mut unchecked = HashSet::new();
        unchecked.insert(other.unique_hash());

        assert_eq!(
            refresh_flags(&other, TabSelection::All, &[], &unchecked),
            RefreshFlags::refresh()
        );
        assert_eq!(
            refresh_flags(&tab, TabSelection::Checked, &[], &unchecked),
            RefreshFlags::refresh()
        );
        assert_eq!(
            refresh_flags(&other, TabSelection::Checked, &[], &unchecked),
            RefreshFlags::NONE
        );
        let selected = vec![tab.clone()];
        assert_eq!(
            refresh_flags(&tab, TabSelection::Selected, &selected, &unchecked),
            RefreshFlags::FORCED
        );
        assert_eq!(
            refresh_flags(&other, TabSelection::Selected, &selected, &unchecked),
            RefreshFlags::NONE
        );
    }

    #[test]
    fn updating_states() {
        assert!(!WorkerState::Idle.is_updating());
        assert!(WorkerState::FetchingFirstTab.is_updating());
        assert!(!WorkerState::Cancelled.is_updating());
    }

    #[test]
    fn run_state_requests_get_increasing_ids() {
        let mut run = RunState::default();
        run.enqueue(Location::stash(0, "a"), "u0".into(), RefreshFlags::NONE);
        run.enqueue(Location::stash(1, "b"), "u1".into(), RefreshFlags::NONE);
        let ids: Vec<u64> = run.queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1]);
        run.cancel(SyncError::NoTabs);
        run.cancel(SyncError::WorkerGone);
        assert!(matches!(run.cancelled, Some(SyncError::NoTabs)));
    }
}
