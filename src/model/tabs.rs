//! Remote stash tab index and the signature used for consistency checks

use super::location::{Location, TabColour};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One entry of the `tabs` array returned with `tabs=1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "i")]
    pub index: usize,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<TabColourJson>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabColourJson {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TabInfo {
    /// Stash location for this tab (hidden tabs included; callers filter)
    pub fn location(&self) -> Location {
        let mut location = Location::stash(self.index, self.name.as_str());
        if !self.id.is_empty() {
            location = location.with_tab_id(self.id.as_str());
        }
        if let Some(c) = self.colour {
            location = location.with_colour(TabColour {
                r: c.r,
                g: c.g,
                b: c.b,
            });
        }
        location
    }
}

/// Parse a `tabs` array, ordered by tab index
pub fn parse_tabs(value: &Value) -> serde_json::Result<Vec<TabInfo>> {
    let mut tabs: Vec<TabInfo> = serde_json::from_value(value.clone())?;
    tabs.sort_by_key(|t| t.index);
    Ok(tabs)
}

/// (name, id) pairs of every known tab, positioned by tab index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSignature {
    entries: BTreeMap<usize, (String, String)>,
}

impl TabSignature {
    pub fn from_tabs(tabs: &[TabInfo]) -> Self {
        let entries = tabs
            .iter()
            .map(|tab| (tab.index, (tab.name.clone(), tab.id.clone())))
            .collect();
        Self { entries }
    }

    /// Signature of a raw `tabs` array; unparseable input yields an empty signature
    pub fn from_value(value: &Value) -> Self {
        match parse_tabs(value) {
            Ok(tabs) => Self::from_tabs(&tabs),
            Err(e) => {
                log::warn!("Failed to parse tab list for signature: {}", e);
                Self::default()
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&(String, String)> {
        self.entries.get(&index)
    }

    /// True if both signatures agree on the tab at `index` (and it exists)
    pub fn matches_at(&self, other: &TabSignature, index: usize) -> bool {
        match (self.get(index), other.get(index)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human readable list of indexes that differ, for log messages
    pub fn describe_mismatch(&self, other: &TabSignature) -> String {
        let indexes: BTreeSet<usize> = self
            .entries
            .keys()
            .chain(other.entries.keys())
            .copied()
            .collect();
        let mut reasons = Vec::new();
        for index in indexes {
            let ours = self.get(index);
            let theirs = other.get(index);
            if ours != theirs {
                let show = |e: Option<&(String, String)>| match e {
                    Some((name, id)) => format!("\"{}\" ({})", name, id),
                    None => "<none>".to_string(),
                };
                reasons.push(format!(
                    "tab {}: {} -> {}",
                    index,
                    show(ours),
                    show(theirs)
                ));
            }
        }
        reasons.join("; ")
    }
}
