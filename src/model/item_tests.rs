//! Tests for item parsing and hashing

use super::*;
use serde_json::json;

fn sample_item() -> Value {
    json!({
        "id": "abc123",
        "name": "<<set:MS>><<set:M>><<set:S>>Doom Knuckle",
        "typeLine": "Titan Gauntlets",
        "frameType": 2,
        "w": 2,
        "h": 2,
        "ilvl": 84,
        "x": 4,
        "y": 0,
        "inventoryId": "Stash1",
        "identified": true,
        "sockets": [
            {"group": 0, "attr": "S", "sColour": "R"},
            {"group": 0, "attr": "D", "sColour": "G"},
            {"group": 1, "attr": "I", "sColour": "B"},
            {"group": 1, "attr": "G", "sColour": "W"}
        ],
        "properties": [
            {"name": "Armour", "values": [["412", 1]], "displayMode": 0},
            {"name": "Elemental Damage", "values": [["5-10", 4], ["3-30", 6]], "displayMode": 0}
        ],
        "requirements": [
            {"name": "Level", "values": [["69", 0]], "displayMode": 0},
            {"name": "Str", "values": [["98", 0]], "displayMode": 1}
        ],
        "implicitMods": ["+20 to maximum Life"],
        "explicitMods": ["+80 to maximum Life", "+40% to Fire Resistance"],
        "note": "~b/o 3 chaos"
    })
}

fn stash() -> Location {
    Location::stash(1, "Dump")
}

#[test]
fn parses_basic_fields() {
    let item = Item::from_json(sample_item(), stash()).unwrap();
    assert_eq!(item.name(), "Doom Knuckle");
    assert_eq!(item.type_line(), "Titan Gauntlets");
    assert_eq!(item.pretty_name(), "Doom Knuckle Titan Gauntlets");
    assert_eq!(item.frame(), FrameType::Rare);
    assert_eq!(item.size(), (2, 2));
    assert_eq!(item.item_level(), 84);
    assert_eq!(item.note(), Some("~b/o 3 chaos"));
    assert_eq!(item.properties().get("Armour").map(String::as_str), Some("412"));
    assert_eq!(item.requirements().get("Level").map(String::as_str), Some("69"));
    assert!(!item.is_corrupted());
    assert!(item.is_identified());
}

#[test]
fn parses_sockets_and_elemental_damage() {
    let item = Item::from_json(sample_item(), stash()).unwrap();
    assert_eq!(item.sockets().len(), 2);
    assert_eq!(item.sockets()[0].red, 1);
    assert_eq!(item.sockets()[0].green, 1);
    assert_eq!(item.sockets()[1].white, 1);
    assert_eq!(item.socket_count(), 4);
    assert_eq!(item.max_links(), 2);
    assert_eq!(
        item.elemental_damage(),
        &[
            ("5-10".to_string(), ElementType::Fire),
            ("3-30".to_string(), ElementType::Lightning)
        ]
    );
}

#[test]
fn pretty_name_falls_back_to_type_line() {
    let item = Item::from_json(json!({"typeLine": "Chaos Orb", "name": ""}), stash()).unwrap();
    assert_eq!(item.pretty_name(), "Chaos Orb");
}

#[test]
fn stack_size_from_field_or_property() {
    let direct = Item::from_json(
        json!({"typeLine": "Chaos Orb", "stackSize": 12, "maxStackSize": 20}),
        stash(),
    )
    .unwrap();
    assert_eq!(direct.stack_size(), 12);
    assert_eq!(direct.max_stack_size(), 20);

    let from_property = Item::from_json(
        json!({
            "typeLine": "Orb of Fusing",
            "properties": [{"name": "Stack Size", "values": [["3/20", 0]]}]
        }),
        stash(),
    )
    .unwrap();
    assert_eq!(from_property.stack_size(), 3);
    assert_eq!(from_property.max_stack_size(), 20);
}

#[test]
fn hash_changes_with_owning_location() {
    let a = Item::from_json(sample_item(), Location::stash(1, "Dump")).unwrap();
    let b = Item::from_json(sample_item(), Location::stash(2, "Other")).unwrap();
    let c = Item::from_json(sample_item(), Location::character("Hero")).unwrap();
    assert_ne!(a.hash(), b.hash());
    assert_ne!(a.hash(), c.hash());
    // legacy hash never included the location
    assert_eq!(a.legacy_hash(), b.legacy_hash());
    assert_ne!(a.hash(), a.legacy_hash());
}

#[test]
fn hash_stable_across_position_and_index() {
    let mut moved = sample_item();
    moved["x"] = json!(9);
    moved["y"] = json!(7);
    let a = Item::from_json(sample_item(), Location::stash(1, "Dump")).unwrap();
    let b = Item::from_json(moved, Location::stash(5, "Dump")).unwrap();
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn hash_changes_with_content() {
    let base = Item::from_json(sample_item(), stash()).unwrap();

    let mut renamed = sample_item();
    renamed["name"] = json!("Other Name");
    let mut new_mod = sample_item();
    new_mod["explicitMods"] = json!(["+81 to maximum Life", "+40% to Fire Resistance"]);
    let mut new_property = sample_item();
    new_property["properties"][0]["values"] = json!([["500", 1]]);
    let mut relinked = sample_item();
    relinked["sockets"][2]["group"] = json!(0);

    for variant in [renamed, new_mod, new_property, relinked] {
        let item = Item::from_json(variant, stash()).unwrap();
        assert_ne!(item.hash(), base.hash());
    }

    let mut noted = sample_item();
    noted["note"] = json!("~price 10 exa");
    let item = Item::from_json(noted, stash()).unwrap();
    assert_eq!(item.hash(), base.hash());
}

#[test]
fn parse_all_includes_socketed_children() {
    let items = json!([
        {
            "id": "parent",
            "typeLine": "Vaal Regalia",
            "x": 2, "y": 3,
            "socketedItems": [
                {"id": "gem", "typeLine": "Arc", "socket": 0, "frameType": 4}
            ]
        },
        "not an item"
    ]);
    let parsed = Item::parse_all(&items, &stash());
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].id(), "parent");
    assert!(parsed[0].json().get("socketedItems").is_none());
    let gem = &parsed[1];
    assert!(gem.location().is_socketed());
    assert_eq!(gem.location().position(), (2, 3));
    assert_eq!(gem.location().socket(), Some(0));
    assert_eq!(gem.frame(), FrameType::Gem);
}

#[test]
fn persisted_json_round_trips() {
    let item = Item::from_json(sample_item(), Location::character("Hero")).unwrap();
    let restored = Item::from_persisted(item.json().clone()).unwrap();
    assert_eq!(restored.hash(), item.hash());
    assert_eq!(restored.location(), item.location());
    assert_eq!(restored.pretty_name(), item.pretty_name());
}

#[test]
fn rejects_non_objects() {
    assert!(Item::from_json(json!([1, 2]), stash()).is_err());
    assert!(Item::from_persisted(json!({"typeLine": "Untagged"})).is_err());
}

#[test]
fn snapshot_order_is_name_then_id_then_hash() {
    let mut items = vec![
        Item::from_json(json!({"id": "2", "typeLine": "B"}), stash()).unwrap(),
        Item::from_json(json!({"id": "1", "typeLine": "B"}), stash()).unwrap(),
        Item::from_json(json!({"id": "9", "typeLine": "A"}), stash()).unwrap(),
    ];
    items.sort_by(Item::snapshot_cmp);
    let ids: Vec<&str> = items.iter().map(Item::id).collect();
    assert_eq!(ids, vec!["9", "1", "2"]);
}

#[test]
fn sha256_hex_is_lowercase_hex() {
    assert_eq!(
        sha256_hex("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
