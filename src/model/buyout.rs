//! Buyout records and the currency / tag lookup tables they use

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Currencies a buyout can be denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Currency {
    #[default]
    None,
    Alteration,
    Fusing,
    Alchemy,
    Chaos,
    Gcp,
    Exalted,
    Chromatic,
    Jeweller,
    Chance,
    Chisel,
    Scouring,
    Blessed,
    Regret,
    Regal,
    Divine,
    Vaal,
    Wisdom,
    Portal,
    Armourer,
    Whetstone,
    Bauble,
    Transmutation,
    Augmentation,
    Mirror,
    Eternal,
    Perandus,
    Silver,
}

lazy_static! {
    /// Tag and alias lookup, built once
    static ref CURRENCY_BY_TAG: HashMap<&'static str, Currency> = {
        let mut map = HashMap::new();
        for currency in Currency::all() {
            map.insert(currency.as_tag(), *currency);
        }
        for (alias, currency) in [
            ("exalted", Currency::Exalted),
            ("ex", Currency::Exalted),
            ("div", Currency::Divine),
            ("c", Currency::Chaos),
            ("alts", Currency::Alteration),
            ("fusing", Currency::Fusing),
            ("fuses", Currency::Fusing),
            ("alchemy", Currency::Alchemy),
            ("chrome", Currency::Chromatic),
            ("jewellers", Currency::Jeweller),
            ("mirror", Currency::Mirror),
            ("coins", Currency::Perandus),
        ] {
            map.insert(alias, currency);
        }
        map
    };
}

impl Currency {
    /// Short tag used in notes and persistence (e.g. "chaos")
    pub fn as_tag(&self) -> &'static str {
        match self {
            Currency::None => "",
            Currency::Alteration => "alt",
            Currency::Fusing => "fuse",
            Currency::Alchemy => "alch",
            Currency::Chaos => "chaos",
            Currency::Gcp => "gcp",
            Currency::Exalted => "exa",
            Currency::Chromatic => "chrom",
            Currency::Jeweller => "jew",
            Currency::Chance => "chance",
            Currency::Chisel => "chisel",
            Currency::Scouring => "scour",
            Currency::Blessed => "blessed",
            Currency::Regret => "regret",
            Currency::Regal => "regal",
            Currency::Divine => "divine",
            Currency::Vaal => "vaal",
            Currency::Wisdom => "wis",
            Currency::Portal => "port",
            Currency::Armourer => "scrap",
            Currency::Whetstone => "whet",
            Currency::Bauble => "bauble",
            Currency::Transmutation => "trans",
            Currency::Augmentation => "aug",
            Currency::Mirror => "mir",
            Currency::Eternal => "eternal",
            Currency::Perandus => "coin",
            Currency::Silver => "silver",
        }
    }

    /// Full display name (e.g. "Chaos Orb")
    pub fn display_name(&self) -> &'static str {
        match self {
            Currency::None => "",
            Currency::Alteration => "Orb of Alteration",
            Currency::Fusing => "Orb of Fusing",
            Currency::Alchemy => "Orb of Alchemy",
            Currency::Chaos => "Chaos Orb",
            Currency::Gcp => "Gemcutter's Prism",
            Currency::Exalted => "Exalted Orb",
            Currency::Chromatic => "Chromatic Orb",
            Currency::Jeweller => "Jeweller's Orb",
            Currency::Chance => "Orb of Chance",
            Currency::Chisel => "Cartographer's Chisel",
            Currency::Scouring => "Orb of Scouring",
            Currency::Blessed => "Blessed Orb",
            Currency::Regret => "Orb of Regret",
            Currency::Regal => "Regal Orb",
            Currency::Divine => "Divine Orb",
            Currency::Vaal => "Vaal Orb",
            Currency::Wisdom => "Scroll of Wisdom",
            Currency::Portal => "Portal Scroll",
            Currency::Armourer => "Armourer's Scrap",
            Currency::Whetstone => "Blacksmith's Whetstone",
            Currency::Bauble => "Glassblower's Bauble",
            Currency::Transmutation => "Orb of Transmutation",
            Currency::Augmentation => "Orb of Augmentation",
            Currency::Mirror => "Mirror of Kalandra",
            Currency::Eternal => "Eternal Orb",
            Currency::Perandus => "Perandus Coin",
            Currency::Silver => "Silver Coin",
        }
    }

    /// Parse a tag or known alias, case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        CURRENCY_BY_TAG
            .get(tag.trim().to_lowercase().as_str())
            .copied()
            .filter(|c| *c != Currency::None)
    }

    /// Returns all currencies, `None` first
    pub fn all() -> &'static [Currency] {
        &[
            Currency::None,
            Currency::Alteration,
            Currency::Fusing,
            Currency::Alchemy,
            Currency::Chaos,
            Currency::Gcp,
            Currency::Exalted,
            Currency::Chromatic,
            Currency::Jeweller,
            Currency::Chance,
            Currency::Chisel,
            Currency::Scouring,
            Currency::Blessed,
            Currency::Regret,
            Currency::Regal,
            Currency::Divine,
            Currency::Vaal,
            Currency::Wisdom,
            Currency::Portal,
            Currency::Armourer,
            Currency::Whetstone,
            Currency::Bauble,
            Currency::Transmutation,
            Currency::Augmentation,
            Currency::Mirror,
            Currency::Eternal,
            Currency::Perandus,
            Currency::Silver,
        ]
    }
}

impl From<String> for Currency {
    fn from(tag: String) -> Self {
        Currency::from_tag(&tag).unwrap_or_default()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_tag().to_string()
    }
}

/// How an item or tab is offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyoutType {
    Ignore,
    Buyout,
    Fixed,
    NoPrice,
    CurrentOffer,
    #[default]
    Inherit,
}

impl BuyoutType {
    /// Tag written in in-game notes ("~b/o ...")
    pub fn as_note_tag(&self) -> &'static str {
        match self {
            BuyoutType::Buyout => "b/o",
            BuyoutType::Fixed => "price",
            BuyoutType::CurrentOffer => "c/o",
            BuyoutType::Ignore | BuyoutType::NoPrice | BuyoutType::Inherit => "",
        }
    }

    pub fn from_note_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "b/o" => Some(BuyoutType::Buyout),
            "price" => Some(BuyoutType::Fixed),
            "c/o" => Some(BuyoutType::CurrentOffer),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BuyoutType::Ignore => "Ignore",
            BuyoutType::Buyout => "Buyout",
            BuyoutType::Fixed => "Fixed price",
            BuyoutType::NoPrice => "No price",
            BuyoutType::CurrentOffer => "Current Offer",
            BuyoutType::Inherit => "Inherit",
        }
    }
}

/// Where a buyout came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyoutSource {
    #[default]
    None,
    Manual,
    Game,
    Auto,
}

/// A price (or explicit lack of one) attached to an item or a whole tab
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buyout {
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: BuyoutType,
    pub currency: Currency,
    pub source: BuyoutSource,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub inherited: bool,
}

impl Default for Buyout {
    fn default() -> Self {
        Self {
            value: 0.0,
            kind: BuyoutType::Inherit,
            currency: Currency::None,
            source: BuyoutSource::None,
            last_update: DateTime::<Utc>::UNIX_EPOCH,
            inherited: false,
        }
    }
}

/// Equality ignores `last_update`, so refreshing a timestamp is not a change
impl PartialEq for Buyout {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.kind == other.kind
            && self.currency == other.currency
            && self.source == other.source
            && self.inherited == other.inherited
    }
}

impl Buyout {
    pub fn new(kind: BuyoutType, value: f64, currency: Currency, source: BuyoutSource) -> Self {
        Self {
            value,
            kind,
            currency,
            source,
            last_update: now_seconds(),
            inherited: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self.kind {
            BuyoutType::Ignore | BuyoutType::Inherit | BuyoutType::NoPrice => true,
            BuyoutType::Buyout | BuyoutType::Fixed | BuyoutType::CurrentOffer => {
                self.currency != Currency::None && self.source != BuyoutSource::None
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_valid() && self.kind != BuyoutType::Inherit
    }

    /// Inherit entries are transient and never persisted
    pub fn is_savable(&self) -> bool {
        self.is_valid() && self.kind != BuyoutType::Inherit
    }

    /// No explicit item-level price: either inherit, or copied from the tab
    pub fn is_inherited(&self) -> bool {
        self.kind == BuyoutType::Inherit || self.inherited
    }

    pub fn is_priced(&self) -> bool {
        matches!(
            self.kind,
            BuyoutType::Buyout | BuyoutType::Fixed | BuyoutType::CurrentOffer
        )
    }

    pub fn is_game_set(&self) -> bool {
        self.source == BuyoutSource::Game
    }

    pub fn requires_refresh(&self) -> bool {
        !matches!(self.kind, BuyoutType::Ignore | BuyoutType::Inherit)
    }

    /// Render as an in-game note, e.g. `~b/o 5 chaos`; empty if not priced
    pub fn as_note(&self) -> String {
        if !self.is_priced() || self.currency == Currency::None {
            return String::new();
        }
        format!(
            "~{} {} {}",
            self.kind.as_note_tag(),
            format_value(self.value),
            self.currency.as_tag()
        )
    }
}

/// Current time truncated to whole seconds, matching the persisted precision
pub fn now_seconds() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
