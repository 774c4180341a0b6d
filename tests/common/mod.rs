//! Shared helpers: a mock remote built on wiremock and a worker harness

#![allow(dead_code)]

use serde_json::{json, Value};
use stash_sync::data_store::MemoryDataStore;
use stash_sync::{
    DataStore, ItemsManagerWorker, ResponseCache, SyncConfig, WorkerCommand, WorkerEvent,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const ACCOUNT: &str = "tester";
pub const LEAGUE: &str = "Standard";
pub const CHARACTER: &str = "Hero";

/// One stash tab of the mock remote
#[derive(Debug, Clone)]
pub struct MockTab {
    pub name: String,
    pub id: String,
    pub hidden: bool,
    pub note: Option<String>,
}

impl MockTab {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            hidden: false,
            note: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// Tabs named "Tab 0", "Tab 1", ... with ids "id-0", "id-1", ...
pub fn numbered_tabs(count: usize) -> Vec<MockTab> {
    (0..count)
        .map(|i| MockTab::new(&format!("Tab {}", i), &format!("id-{}", i)))
        .collect()
}

pub fn tabs_json(tabs: &[MockTab]) -> Value {
    Value::Array(
        tabs.iter()
            .enumerate()
            .map(|(i, tab)| {
                json!({
                    "n": tab.name,
                    "i": i,
                    "id": tab.id,
                    "hidden": tab.hidden,
                    "colour": {"r": 10, "g": 20, "b": 30}
                })
            })
            .collect(),
    )
}

/// The single item stored in tab `index`
pub fn tab_item(index: usize, tab: &MockTab) -> Value {
    let mut item = json!({
        "id": format!("item-{}", index),
        "typeLine": format!("Item {:02}", index),
        "frameType": 0,
        "w": 1,
        "h": 1,
        "x": 0,
        "y": 0,
        "inventoryId": "Stash1",
        "explicitMods": [format!("+{} to Strength", index)]
    });
    if let Some(note) = &tab.note {
        item["note"] = json!(note);
    }
    item
}

fn tab_index(request: &Request) -> usize {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "tabIndex")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

/// Answers get-stash-items with the tab index plus that tab's item.
///
/// With `rename` set, every request except `seed_index` sees the tab list
/// with one tab renamed.
pub struct StashResponder {
    pub tabs: Vec<MockTab>,
    pub rename: Option<(usize, String)>,
    pub seed_index: usize,
}

impl StashResponder {
    pub fn new(tabs: Vec<MockTab>) -> Self {
        Self {
            tabs,
            rename: None,
            seed_index: 1,
        }
    }
}

impl Respond for StashResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let index = tab_index(request);
        let mut tabs = self.tabs.clone();
        if let Some((renamed, name)) = &self.rename {
            if index != self.seed_index {
                tabs[*renamed].name = name.clone();
            }
        }
        let items = match tabs.get(index) {
            Some(tab) => vec![tab_item(index, tab)],
            None => Vec::new(),
        };
        ResponseTemplate::new(200)
            .insert_header("Cache-Control", "no-store, no-cache, must-revalidate")
            .set_body_json(json!({
                "numTabs": tabs.len(),
                "tabs": tabs_json(&tabs),
                "items": items
            }))
    }
}

/// Mount main page, character list and character items
pub async fn mount_account(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/my-account"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no script</html>"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/character-window/get-characters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": CHARACTER, "league": LEAGUE, "class": "Witch"},
            {"name": "Elsewhere", "league": "Hardcore", "class": "Duelist"}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/character-window/get-items"))
        .and(query_param("character", CHARACTER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "hero-amulet", "typeLine": "Onyx Amulet", "inventoryId": "Amulet", "x": 0, "y": 0}
            ]
        })))
        .mount(server)
        .await;
}

/// Mount the whole remote with the given tabs
pub async fn mount_remote(server: &MockServer, tabs: Vec<MockTab>) {
    mount_account(server).await;
    mount_stash(server, StashResponder::new(tabs)).await;
}

pub async fn mount_stash(server: &MockServer, responder: StashResponder) {
    Mock::given(method("GET"))
        .and(path("/character-window/get-stash-items"))
        .respond_with(responder)
        .mount(server)
        .await;
}

pub fn test_config(server: &MockServer, cache_root: &Path) -> SyncConfig {
    let mut config = SyncConfig::new(ACCOUNT, LEAGUE);
    config.base_url = server.uri();
    config.cache_root = cache_root.to_path_buf();
    config.throttle_sleep = Duration::from_millis(10);
    config
}

/// A worker driven directly by the test, plus the ends of its channels
pub struct Harness {
    pub worker: ItemsManagerWorker,
    pub commands: mpsc::UnboundedSender<WorkerCommand>,
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
    pub data: Arc<dyn DataStore>,
    pub cache: Arc<ResponseCache>,
    pub cache_dir: TempDir,
}

impl Harness {
    pub fn new(server: &MockServer) -> Self {
        Self::with_data(server, Arc::new(MemoryDataStore::new()))
    }

    pub fn with_data(server: &MockServer, data: Arc<dyn DataStore>) -> Self {
        let cache_dir = TempDir::new().unwrap();
        Self::build(test_config(server, cache_dir.path()), data, cache_dir)
    }

    pub fn build(config: SyncConfig, data: Arc<dyn DataStore>, cache_dir: TempDir) -> Self {
        let cache = Arc::new(ResponseCache::new(
            reqwest::Client::new(),
            &config.cache_dir(),
            config.cache_max_bytes,
            config.cache_expiry_days,
            config.cache_policy,
        ));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let worker = ItemsManagerWorker::new(
            config,
            Arc::clone(&cache),
            data.clone(),
            command_rx,
            event_tx,
        );
        Self {
            worker,
            commands,
            events,
            data,
            cache,
            cache_dir,
        }
    }

    /// Everything emitted so far
    pub fn drain_events(&mut self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn no_unchecked() -> HashSet<String> {
    HashSet::new()
}
