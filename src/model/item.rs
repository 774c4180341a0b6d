//! Inventory items parsed from stash / character JSON

use super::location::Location;
use crate::error::{Result, SyncError};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Rarity / frame class from `frameType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Normal,
    Magic,
    Rare,
    Unique,
    Gem,
    Currency,
    DivinationCard,
    Quest,
    Prophecy,
    Relic,
    Other(i64),
}

impl FrameType {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FrameType::Normal,
            1 => FrameType::Magic,
            2 => FrameType::Rare,
            3 => FrameType::Unique,
            4 => FrameType::Gem,
            5 => FrameType::Currency,
            6 => FrameType::DivinationCard,
            7 => FrameType::Quest,
            8 => FrameType::Prophecy,
            9 => FrameType::Relic,
            other => FrameType::Other(other),
        }
    }
}

/// Element of an "Elemental Damage" property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Fire,
    Cold,
    Lightning,
}

impl ElementType {
    fn from_value_type(code: i64) -> Option<Self> {
        match code {
            4 => Some(ElementType::Fire),
            5 => Some(ElementType::Cold),
            6 => Some(ElementType::Lightning),
            _ => None,
        }
    }
}

/// Colour counts of one linked socket group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SocketGroup {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub white: u32,
}

impl SocketGroup {
    pub fn total(&self) -> u32 {
        self.red + self.green + self.blue + self.white
    }

    fn layout(&self) -> String {
        let mut colours = Vec::new();
        colours.extend(std::iter::repeat("R").take(self.red as usize));
        colours.extend(std::iter::repeat("G").take(self.green as usize));
        colours.extend(std::iter::repeat("B").take(self.blue as usize));
        colours.extend(std::iter::repeat("W").take(self.white as usize));
        colours.join("-")
    }
}

/// An item as fetched from the remote; never mutated after parsing
#[derive(Debug, Clone)]
pub struct Item {
    json: Value,
    id: String,
    name: String,
    type_line: String,
    frame: FrameType,
    width: u32,
    height: u32,
    item_level: u32,
    sockets: Vec<SocketGroup>,
    properties: BTreeMap<String, String>,
    requirements: BTreeMap<String, String>,
    elemental_damage: Vec<(String, ElementType)>,
    explicit_mods: Vec<String>,
    implicit_mods: Vec<String>,
    crafted_mods: Vec<String>,
    enchant_mods: Vec<String>,
    stack_size: u32,
    max_stack_size: u32,
    corrupted: bool,
    identified: bool,
    note: Option<String>,
    location: Location,
    hash: String,
    legacy_hash: String,
}

impl Item {
    /// Parse an item located at `location`; the JSON is tagged with the location
    pub fn from_json(mut json: Value, location: Location) -> Result<Self> {
        let object = json
            .as_object_mut()
            .ok_or_else(|| SyncError::MalformedReply("item is not a JSON object".to_string()))?;
        location.write_item_tags(object);
        Ok(Self::build(json, location))
    }

    /// Parse an item persisted with location tags
    pub fn from_persisted(json: Value) -> Result<Self> {
        if !json.is_object() {
            return Err(SyncError::MalformedReply(
                "persisted item is not a JSON object".to_string(),
            ));
        }
        let location = Location::from_item_tags(&json).ok_or_else(|| {
            SyncError::MalformedReply("persisted item has no location tags".to_string())
        })?;
        Ok(Self::build(json, location))
    }

    /// Parse an `items` array found in `container`, including socketed children.
    ///
    /// Entries that are not objects are skipped with a warning.
    pub fn parse_all(items: &Value, container: &Location) -> Vec<Item> {
        let mut parsed = Vec::new();
        if let Some(array) = items.as_array() {
            for raw in array {
                collect_items(raw, container, &mut parsed);
            }
        }
        parsed
    }

    fn build(json: Value, location: Location) -> Self {
        let name = strip_markup(str_field(&json, "name"));
        let type_line = strip_markup(str_field(&json, "typeLine"));
        let explicit_mods = string_list(&json, "explicitMods");
        let implicit_mods = string_list(&json, "implicitMods");
        let crafted_mods = string_list(&json, "craftedMods");
        let enchant_mods = string_list(&json, "enchantMods");
        let sockets = parse_sockets(&json);

        let mut properties = BTreeMap::new();
        let mut elemental_damage = Vec::new();
        let mut property_text = String::new();
        for property in json
            .get("properties")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let prop_name = str_field(property, "name").to_string();
            let values = property_values(property);
            if prop_name == "Elemental Damage" {
                for (value, value_type) in &values {
                    if let Some(element) = ElementType::from_value_type(*value_type) {
                        elemental_damage.push((value.clone(), element));
                    }
                }
            }
            let joined = values
                .iter()
                .map(|(v, _)| v.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            property_text.push_str(&prop_name);
            property_text.push(':');
            property_text.push_str(&joined);
            property_text.push('~');
            if !prop_name.is_empty() {
                properties.insert(prop_name, joined);
            }
        }

        let mut requirements = BTreeMap::new();
        for requirement in json
            .get("requirements")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let req_name = str_field(requirement, "name").to_string();
            if let Some((value, _)) = property_values(requirement).into_iter().next() {
                requirements.insert(req_name, value);
            }
        }

        let (stack_size, max_stack_size) = parse_stack(&json, &properties);

        let mut content = format!("{}~{}~", name, type_line);
        for m in explicit_mods.iter().chain(implicit_mods.iter()) {
            content.push_str(m);
            content.push('~');
        }
        content.push_str(&property_text);
        content.push('~');
        content.push_str(&socket_layout(&sockets));
        content.push('~');

        let legacy_hash = sha256_hex(&content);
        let hash = sha256_hex(&format!("{}{}", content, location.unique_hash()));

        Self {
            id: str_field(&json, "id").to_string(),
            frame: FrameType::from_code(json.get("frameType").and_then(Value::as_i64).unwrap_or(0)),
            width: u32_field(&json, "w"),
            height: u32_field(&json, "h"),
            item_level: u32_field(&json, "ilvl"),
            corrupted: json.get("corrupted").and_then(Value::as_bool).unwrap_or(false),
            identified: json.get("identified").and_then(Value::as_bool).unwrap_or(true),
            note: json
                .get("note")
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|n| !n.is_empty()),
            name,
            type_line,
            sockets,
            properties,
            requirements,
            elemental_damage,
            explicit_mods,
            implicit_mods,
            crafted_mods,
            enchant_mods,
            stack_size,
            max_stack_size,
            location,
            hash,
            legacy_hash,
            json,
        }
    }

    /// Name shown to users: "<name> <type line>", or just the type line
    pub fn pretty_name(&self) -> String {
        if self.name.is_empty() {
            self.type_line.clone()
        } else {
            format!("{} {}", self.name, self.type_line)
        }
    }

    /// Total order used for published snapshots
    pub fn snapshot_cmp(&self, other: &Item) -> Ordering {
        self.pretty_name()
            .cmp(&other.pretty_name())
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.hash.cmp(&other.hash))
    }

    /// JSON as persisted, including location tags
    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_line(&self) -> &str {
        &self.type_line
    }

    pub fn frame(&self) -> FrameType {
        self.frame
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn item_level(&self) -> u32 {
        self.item_level
    }

    pub fn sockets(&self) -> &[SocketGroup] {
        &self.sockets
    }

    pub fn socket_count(&self) -> u32 {
        self.sockets.iter().map(SocketGroup::total).sum()
    }

    pub fn max_links(&self) -> u32 {
        self.sockets.iter().map(SocketGroup::total).max().unwrap_or(0)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn requirements(&self) -> &BTreeMap<String, String> {
        &self.requirements
    }

    pub fn elemental_damage(&self) -> &[(String, ElementType)] {
        &self.elemental_damage
    }

    pub fn explicit_mods(&self) -> &[String] {
        &self.explicit_mods
    }

    pub fn implicit_mods(&self) -> &[String] {
        &self.implicit_mods
    }

    pub fn crafted_mods(&self) -> &[String] {
        &self.crafted_mods
    }

    pub fn enchant_mods(&self) -> &[String] {
        &self.enchant_mods
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    pub fn max_stack_size(&self) -> u32 {
        self.max_stack_size
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    pub fn is_identified(&self) -> bool {
        self.identified
    }

    /// In-game note, e.g. `~b/o 5 chaos`
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Content hash, primary key for item buyouts
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Hash from the previous scheme, only used for migration
    pub fn legacy_hash(&self) -> &str {
        &self.legacy_hash
    }
}

fn collect_items(raw: &Value, container: &Location, out: &mut Vec<Item>) {
    if !raw.is_object() {
        log::warn!("Skipping non-object item entry in {}", container.header());
        return;
    }
    let location = container.for_item(raw);
    let children = raw.get("socketedItems").cloned();
    let mut stripped = raw.clone();
    if let Some(object) = stripped.as_object_mut() {
        object.remove("socketedItems");
    }
    match Item::from_json(stripped, location.clone()) {
        Ok(item) => out.push(item),
        Err(e) => log::warn!("Failed to parse item in {}: {}", container.header(), e),
    }
    if let Some(Value::Array(children)) = children {
        let child_container = location.socketed_child();
        for child in &children {
            collect_items(child, &child_container, out);
        }
    }
}

/// Lowercase hex SHA-256, used for item hashes and cache file names
pub(crate) fn sha256_hex(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn str_field<'a>(json: &'a Value, key: &str) -> &'a str {
    json.get(key).and_then(Value::as_str).unwrap_or("")
}

fn u32_field(json: &Value, key: &str) -> u32 {
    json.get(key).and_then(Value::as_u64).unwrap_or(0) as u32
}

fn string_list(json: &Value, key: &str) -> Vec<String> {
    json.get(key)
        .and_then(Value::as_array)
        .map(|mods| {
            mods.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Remove `<<set:MS>><<set:M>><<set:S>>` style markup prefixes
fn strip_markup(value: &str) -> String {
    match value.rfind(">>") {
        Some(pos) if value.starts_with("<<") => value[pos + 2..].to_string(),
        _ => value.to_string(),
    }
}

/// `values` is a list of `[text, type]` pairs
fn property_values(property: &Value) -> Vec<(String, i64)> {
    property
        .get("values")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|pair| {
            let pair = pair.as_array()?;
            let text = pair.first()?.as_str()?.to_string();
            let kind = pair.get(1).and_then(Value::as_i64).unwrap_or(0);
            Some((text, kind))
        })
        .collect()
}

fn parse_sockets(json: &Value) -> Vec<SocketGroup> {
    let mut groups: BTreeMap<u64, SocketGroup> = BTreeMap::new();
    for socket in json
        .get("sockets")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let group = socket.get("group").and_then(Value::as_u64).unwrap_or(0);
        let colour = socket
            .get("sColour")
            .and_then(Value::as_str)
            .or_else(|| socket.get("attr").and_then(Value::as_str))
            .unwrap_or("");
        let entry = groups.entry(group).or_default();
        match colour {
            "R" | "S" => entry.red += 1,
            "G" | "D" => entry.green += 1,
            "B" | "I" => entry.blue += 1,
            _ => entry.white += 1,
        }
    }
    groups.into_values().collect()
}

fn socket_layout(groups: &[SocketGroup]) -> String {
    groups
        .iter()
        .map(SocketGroup::layout)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stack size from `stackSize`/`maxStackSize`, falling back to a "Stack Size" property ("3/40")
fn parse_stack(json: &Value, properties: &BTreeMap<String, String>) -> (u32, u32) {
    if let Some(size) = json.get("stackSize").and_then(Value::as_u64) {
        let max = json.get("maxStackSize").and_then(Value::as_u64).unwrap_or(0);
        return (size as u32, max as u32);
    }
    if let Some(text) = properties.get("Stack Size") {
        let mut parts = text.split('/');
        let size = parts
            .next()
            .and_then(|s| s.trim().replace(',', "").parse().ok())
            .unwrap_or(0);
        let max = parts
            .next()
            .and_then(|s| s.trim().replace(',', "").parse().ok())
            .unwrap_or(0);
        return (size, max);
    }
    (0, 0)
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
