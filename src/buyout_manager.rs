//! Pricing store: item and tab buyouts, refresh flags, propagation
//!
//! Item buyouts are keyed by the item content hash, tab buyouts by the
//! location unique hash. Both maps are persisted through the [`DataStore`]
//! as JSON objects; only savable entries are written.

use crate::data_store::DataStore;
use crate::error::Result;
use crate::model::buyout::now_seconds;
use crate::model::{Buyout, BuyoutSource, BuyoutType, Currency, Item, Location};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

pub const BUYOUTS_KEY: &str = "buyouts";
pub const TAB_BUYOUTS_KEY: &str = "tab_buyouts";
pub const REFRESH_CHECKED_KEY: &str = "refresh_checked_state";

lazy_static! {
    static ref NOTE_PATTERN: Regex =
        Regex::new(r"~(\S+)\s+([0-9.,/]+)\s+(\S+)").expect("valid note pattern");
}

/// Durable hash → buyout mapping with inheritance and compaction
pub struct BuyoutManager {
    data: Arc<dyn DataStore>,
    buyouts: BTreeMap<String, Buyout>,
    tab_buyouts: BTreeMap<String, Buyout>,
    refresh_checked: BTreeMap<String, bool>,
    refresh_locked: BTreeSet<String>,
    save_needed: bool,
}

impl BuyoutManager {
    /// Empty store; call [`BuyoutManager::load`] to read persisted state
    pub fn new(data: Arc<dyn DataStore>) -> Self {
        Self {
            data,
            buyouts: BTreeMap::new(),
            tab_buyouts: BTreeMap::new(),
            refresh_checked: BTreeMap::new(),
            refresh_locked: BTreeSet::new(),
            save_needed: false,
        }
    }

    pub fn set(&mut self, item: &Item, buyout: Buyout) {
        if self.buyouts.get(item.hash()) != Some(&buyout) {
            self.buyouts.insert(item.hash().to_string(), buyout);
            self.save_needed = true;
        }
    }

    pub fn get(&self, item: &Item) -> Buyout {
        self.buyouts.get(item.hash()).cloned().unwrap_or_default()
    }

    pub fn exists(&self, item: &Item) -> bool {
        self.buyouts.contains_key(item.hash())
    }

    pub fn delete(&mut self, item: &Item) {
        if self.buyouts.remove(item.hash()).is_some() {
            self.save_needed = true;
        }
    }

    pub fn set_tab(&mut self, location: &Location, buyout: Buyout) {
        let key = location.unique_hash();
        if self.tab_buyouts.get(&key) != Some(&buyout) {
            self.tab_buyouts.insert(key, buyout);
            self.save_needed = true;
        }
    }

    pub fn get_tab(&self, location: &Location) -> Buyout {
        self.tab_buyouts
            .get(&location.unique_hash())
            .cloned()
            .unwrap_or_default()
    }

    pub fn exists_tab(&self, location: &Location) -> bool {
        self.tab_buyouts.contains_key(&location.unique_hash())
    }

    pub fn delete_tab(&mut self, location: &Location) {
        if self.tab_buyouts.remove(&location.unique_hash()).is_some() {
            self.save_needed = true;
        }
    }

    pub fn item_count(&self) -> usize {
        self.buyouts.len()
    }

    pub fn tab_count(&self) -> usize {
        self.tab_buyouts.len()
    }

    pub fn set_refresh_checked(&mut self, location: &Location, checked: bool) {
        let key = location.unique_hash();
        if self.refresh_checked.get(&key) != Some(&checked) {
            self.refresh_checked.insert(key, checked);
            self.save_needed = true;
        }
    }

    /// Whether the location should be refreshed under the "Checked" policy.
    /// Locked locations are always refreshed.
    pub fn get_refresh_checked(&self, location: &Location) -> bool {
        let key = location.unique_hash();
        let checked = self.refresh_checked.get(&key).copied().unwrap_or(true);
        checked || self.refresh_locked.contains(&key)
    }

    pub fn set_refresh_locked(&mut self, location: &Location) {
        self.refresh_locked.insert(location.unique_hash());
    }

    pub fn get_refresh_locked(&self, location: &Location) -> bool {
        self.refresh_locked.contains(&location.unique_hash())
    }

    pub fn clear_refresh_locks(&mut self) {
        self.refresh_locked.clear();
    }

    /// Drop tab buyouts whose location no longer exists
    pub fn compress_tab_buyouts(&mut self, locations: &[Location]) {
        let live: HashSet<String> = locations.iter().map(Location::unique_hash).collect();
        let before = self.tab_buyouts.len();
        self.tab_buyouts.retain(|key, _| live.contains(key));
        let removed = before - self.tab_buyouts.len();
        if removed > 0 {
            log::info!("Removed {} tab buyouts for vanished locations", removed);
            self.save_needed = true;
        }
    }

    /// Drop item buyouts whose item is not in the current snapshot
    pub fn compress_item_buyouts(&mut self, items: &[Arc<Item>]) {
        let live: HashSet<&str> = items.iter().map(|item| item.hash()).collect();
        let before = self.buyouts.len();
        self.buyouts.retain(|key, _| live.contains(key.as_str()));
        let removed = before - self.buyouts.len();
        if removed > 0 {
            log::info!("Removed {} buyouts for vanished items", removed);
            self.save_needed = true;
        }
    }

    /// Copy active tab buyouts onto items without their own price and
    /// lock priced locations for the next "Checked" update.
    pub fn propagate(&mut self, items: &[Arc<Item>]) {
        self.clear_refresh_locks();

        for item in items {
            let location = item.location();
            let tab = self.get_tab(location);
            let mut own = self.get(item);

            if own.is_inherited() {
                if tab.is_active() {
                    let mut inherited = tab.clone();
                    inherited.inherited = true;
                    inherited.last_update = now_seconds();
                    // Equality ignores the timestamp, so an unchanged tab
                    // price does not dirty the store.
                    self.set(item, inherited.clone());
                    own = inherited;
                } else if self.buyouts.contains_key(item.hash()) {
                    // only a stale inherited price needs resetting; absent
                    // entries already read as the default
                    self.set(item, Buyout::default());
                    own = Buyout::default();
                }
            }

            if own.requires_refresh() || tab.requires_refresh() {
                self.set_refresh_locked(location);
            }
        }
    }

    /// Parse in-game note text such as `~b/o 5 chaos` or `~price 1,5 exa`.
    /// Anything unrecognised yields the default inherit buyout.
    pub fn string_to_buyout(text: &str) -> Buyout {
        let Some(captures) = NOTE_PATTERN.captures(text) else {
            return Buyout::default();
        };
        let Some(kind) = BuyoutType::from_note_tag(&captures[1]) else {
            log::debug!("Unknown price tag in note: {}", text);
            return Buyout::default();
        };
        let Some(value) = parse_note_value(&captures[2]) else {
            log::debug!("Unparseable price value in note: {}", text);
            return Buyout::default();
        };
        let currency = Currency::from_tag(&captures[3]).unwrap_or_default();
        if currency == Currency::None {
            log::debug!("Unknown currency in note: {}", text);
            return Buyout::default();
        }
        Buyout::new(kind, value, currency, BuyoutSource::Game)
    }

    /// Move a buyout stored under the item's legacy hash to its content hash
    pub fn migrate_item(&mut self, item: &Item) {
        if let Some(buyout) = self.buyouts.remove(item.legacy_hash()) {
            self.buyouts.entry(item.hash().to_string()).or_insert(buyout);
            self.save_needed = true;
        }
    }

    /// Load both buyout maps and the refresh-checked table
    pub fn load(&mut self) -> Result<()> {
        if let Some(json) = self.data.get(BUYOUTS_KEY)? {
            self.buyouts = Self::deserialize(&json);
        }
        if let Some(json) = self.data.get(TAB_BUYOUTS_KEY)? {
            self.tab_buyouts = Self::deserialize(&json);
        }
        if let Some(json) = self.data.get(REFRESH_CHECKED_KEY)? {
            match serde_json::from_str(&json) {
                Ok(map) => self.refresh_checked = map,
                Err(e) => log::warn!("Failed to parse refresh checked state: {}", e),
            }
        }
        self.save_needed = false;
        log::info!(
            "Loaded {} item buyouts and {} tab buyouts",
            self.buyouts.len(),
            self.tab_buyouts.len()
        );
        Ok(())
    }

    /// Persist everything if anything changed since the last save
    pub fn save(&mut self) -> Result<()> {
        if !self.save_needed {
            return Ok(());
        }
        let buyouts = Self::serialize(&self.buyouts)?;
        let tab_buyouts = Self::serialize(&self.tab_buyouts)?;
        let refresh_checked = serde_json::to_string(&self.refresh_checked)?;
        self.data.set_many(&[
            (BUYOUTS_KEY, buyouts.as_str()),
            (TAB_BUYOUTS_KEY, tab_buyouts.as_str()),
            (REFRESH_CHECKED_KEY, refresh_checked.as_str()),
        ])?;
        self.save_needed = false;
        log::debug!(
            "Saved {} item buyouts and {} tab buyouts",
            self.buyouts.len(),
            self.tab_buyouts.len()
        );
        Ok(())
    }

    pub fn needs_save(&self) -> bool {
        self.save_needed
    }

    /// JSON object of savable entries
    pub fn serialize(buyouts: &BTreeMap<String, Buyout>) -> Result<String> {
        let savable: BTreeMap<&String, &Buyout> = buyouts
            .iter()
            .filter(|(_, buyout)| buyout.is_savable())
            .collect();
        Ok(serde_json::to_string(&savable)?)
    }

    /// Parse a persisted map, skipping entries that no longer parse
    pub fn deserialize(json: &str) -> BTreeMap<String, Buyout> {
        let raw: BTreeMap<String, Value> = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Failed to parse buyout map: {}", e);
                return BTreeMap::new();
            }
        };
        raw.into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<Buyout>(value) {
                Ok(buyout) if buyout.is_valid() => Some((key, buyout)),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Skipping unreadable buyout {}: {}", key, e);
                    None
                }
            })
            .collect()
    }
}

fn parse_note_value(raw: &str) -> Option<f64> {
    let normalized = raw.replace(',', ".");
    let value = match normalized.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: f64 = numerator.parse().ok()?;
            let denominator: f64 = denominator.parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => normalized.parse().ok()?,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
#[path = "buyout_manager_tests.rs"]
mod tests;
