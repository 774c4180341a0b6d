//! Storage locations: stash tabs and character inventories

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Which container an item lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Stash { tab_index: usize, tab_label: String },
    Character { name: String },
}

/// Tab colour as reported by the tab index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TabColour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A stash tab or character, optionally narrowed to a position inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    kind: LocationKind,
    tab_id: Option<String>,
    colour: Option<TabColour>,
    x: i64,
    y: i64,
    inventory_id: Option<String>,
    socketed: bool,
    socket: Option<u32>,
}

impl Location {
    pub fn stash(tab_index: usize, tab_label: impl Into<String>) -> Self {
        Self::from_kind(LocationKind::Stash {
            tab_index,
            tab_label: tab_label.into(),
        })
    }

    pub fn character(name: impl Into<String>) -> Self {
        Self::from_kind(LocationKind::Character { name: name.into() })
    }

    fn from_kind(kind: LocationKind) -> Self {
        Self {
            kind,
            tab_id: None,
            colour: None,
            x: 0,
            y: 0,
            inventory_id: None,
            socketed: false,
            socket: None,
        }
    }

    pub fn with_tab_id(mut self, tab_id: impl Into<String>) -> Self {
        self.tab_id = Some(tab_id.into());
        self
    }

    pub fn with_colour(mut self, colour: TabColour) -> Self {
        self.colour = Some(colour);
        self
    }

    pub fn kind(&self) -> &LocationKind {
        &self.kind
    }

    pub fn is_stash(&self) -> bool {
        matches!(self.kind, LocationKind::Stash { .. })
    }

    pub fn is_character(&self) -> bool {
        matches!(self.kind, LocationKind::Character { .. })
    }

    pub fn tab_index(&self) -> Option<usize> {
        match &self.kind {
            LocationKind::Stash { tab_index, .. } => Some(*tab_index),
            LocationKind::Character { .. } => None,
        }
    }

    pub fn tab_label(&self) -> Option<&str> {
        match &self.kind {
            LocationKind::Stash { tab_label, .. } => Some(tab_label),
            LocationKind::Character { .. } => None,
        }
    }

    pub fn character_name(&self) -> Option<&str> {
        match &self.kind {
            LocationKind::Character { name } => Some(name),
            LocationKind::Stash { .. } => None,
        }
    }

    pub fn tab_id(&self) -> Option<&str> {
        self.tab_id.as_deref()
    }

    pub fn colour(&self) -> Option<TabColour> {
        self.colour
    }

    pub fn position(&self) -> (i64, i64) {
        (self.x, self.y)
    }

    pub fn inventory_id(&self) -> Option<&str> {
        self.inventory_id.as_deref()
    }

    pub fn is_socketed(&self) -> bool {
        self.socketed
    }

    pub fn socket(&self) -> Option<u32> {
        self.socket
    }

    /// Pricing key for the whole tab or character, independent of position
    pub fn unique_hash(&self) -> String {
        match &self.kind {
            LocationKind::Stash { tab_label, .. } => format!("stash:{}", tab_label),
            LocationKind::Character { name } => format!("character:{}", name),
        }
    }

    /// Display header; changes when a tab is renamed or moved
    pub fn header(&self) -> String {
        match &self.kind {
            LocationKind::Stash {
                tab_index,
                tab_label,
            } => format!("#{}, \"{}\"", tab_index.saturating_add(1), tab_label),
            LocationKind::Character { name } => name.clone(),
        }
    }

    /// Same container without any item position
    pub fn container(&self) -> Location {
        let mut base = Self::from_kind(self.kind.clone());
        base.tab_id = self.tab_id.clone();
        base.colour = self.colour;
        base
    }

    /// Location of an item found inside this container.
    ///
    /// Socketed children keep their parent's x/y and only record the socket.
    pub fn for_item(&self, item: &Value) -> Location {
        let mut location = self.clone();
        if self.socketed {
            location.socket = item
                .get("socket")
                .and_then(Value::as_u64)
                .map(|s| s as u32);
            return location;
        }
        if let (Some(x), Some(y)) = (
            item.get("x").and_then(Value::as_i64),
            item.get("y").and_then(Value::as_i64),
        ) {
            location.x = x;
            location.y = y;
        }
        location.inventory_id = item
            .get("inventoryId")
            .and_then(Value::as_str)
            .map(str::to_string);
        location
    }

    /// Location used for the children socketed into an item at this location
    pub fn socketed_child(&self) -> Location {
        let mut location = self.clone();
        location.socketed = true;
        location.socket = None;
        location
    }

    /// Write the location tags persisted alongside item JSON
    pub fn write_item_tags(&self, item: &mut Map<String, Value>) {
        match &self.kind {
            LocationKind::Stash {
                tab_index,
                tab_label,
            } => {
                item.insert("_type".into(), Value::from("stash"));
                item.insert("_tab".into(), Value::from(*tab_index as u64));
                item.insert("_tab_label".into(), Value::from(tab_label.as_str()));
            }
            LocationKind::Character { name } => {
                item.insert("_type".into(), Value::from("character"));
                item.insert("_character".into(), Value::from(name.as_str()));
            }
        }
        if self.socketed {
            item.insert("_socketed".into(), Value::Bool(true));
            item.insert("_x".into(), Value::from(self.x));
            item.insert("_y".into(), Value::from(self.y));
        }
    }

    /// Rebuild a location from persisted item tags
    pub fn from_item_tags(item: &Value) -> Option<Location> {
        let base = match item.get("_type").and_then(Value::as_str)? {
            "stash" => Location::stash(
                item.get("_tab").and_then(Value::as_u64)? as usize,
                item.get("_tab_label").and_then(Value::as_str)?,
            ),
            "character" => Location::character(item.get("_character").and_then(Value::as_str)?),
            _ => return None,
        };
        if item.get("_socketed").and_then(Value::as_bool).unwrap_or(false) {
            let mut location = base.socketed_child();
            location.x = item.get("_x").and_then(Value::as_i64).unwrap_or(0);
            location.y = item.get("_y").and_then(Value::as_i64).unwrap_or(0);
            return Some(location.for_item(item));
        }
        Some(base.for_item(item))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        let kind = match (&self.kind, &other.kind) {
            (LocationKind::Stash { .. }, LocationKind::Character { .. }) => Ordering::Less,
            (LocationKind::Character { .. }, LocationKind::Stash { .. }) => Ordering::Greater,
            (
                LocationKind::Stash {
                    tab_index: a,
                    tab_label: la,
                },
                LocationKind::Stash {
                    tab_index: b,
                    tab_label: lb,
                },
            ) => a.cmp(b).then_with(|| la.cmp(lb)),
            (LocationKind::Character { name: a }, LocationKind::Character { name: b }) => a.cmp(b),
        };
        kind.then_with(|| self.y.cmp(&other.y))
            .then_with(|| self.x.cmp(&other.x))
            .then_with(|| self.socketed.cmp(&other.socketed))
            .then_with(|| self.socket.cmp(&other.socket))
            .then_with(|| self.inventory_id.cmp(&other.inventory_id))
            .then_with(|| self.tab_id.cmp(&other.tab_id))
            .then_with(|| {
                let colour = |c: &Option<TabColour>| c.map(|c| (c.r, c.g, c.b));
                colour(&self.colour).cmp(&colour(&other.colour))
            })
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
