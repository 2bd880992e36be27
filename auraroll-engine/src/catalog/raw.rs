//! Serde shapes accepted in catalog JSON.
//!
//! Authoring data is loose: context lists arrive as arrays, comma-joined
//! strings or not at all, and multipliers as numbers or numeric strings.
//! Everything here is converted into canonical forms by `Catalog::from_raw`.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCatalog {
    pub default_context: String,
    #[serde(default)]
    pub contexts: Vec<RawContext>,
    #[serde(default)]
    pub runes: Vec<RawRune>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub presets: Vec<RawPreset>,
    #[serde(default)]
    pub items: Vec<RawItem>,
    #[serde(default)]
    pub overrides: RawOverrides,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawContext {
    pub id: String,
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub time: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawRune {
    pub id: String,
    #[serde(default)]
    pub implies: Option<IdListRepr>,
    #[serde(default)]
    pub excludes: Option<IdListRepr>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawEvent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPreset {
    pub id: String,
    #[serde(default)]
    pub min_luck: f64,
    #[serde(default)]
    pub fixed_chance: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawItem {
    pub name: String,
    pub chance: f64,
    #[serde(default, alias = "native_contexts", alias = "native_biomes")]
    pub native: Option<IdListRepr>,
    #[serde(default)]
    pub breakthroughs: BTreeMap<String, MultiplierRepr>,
    #[serde(default)]
    pub ignore_luck: bool,
    #[serde(default)]
    pub fixed_roll_threshold: Option<u64>,
    #[serde(default)]
    pub requires_presets: Option<IdListRepr>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub disable_rarity_class: bool,
    #[serde(default)]
    pub cutscene: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawOverrides {
    #[serde(default)]
    pub base_context_items: Vec<String>,
    #[serde(default)]
    pub context_exclusions: BTreeMap<String, IdListRepr>,
    #[serde(default)]
    pub aggregate_blocklist: Vec<String>,
    #[serde(default)]
    pub aggregate_excluded_contexts: Option<IdListRepr>,
    #[serde(default)]
    pub event_access_grants: Vec<RawAccessGrant>,
    #[serde(default)]
    pub sort_pins: BTreeMap<String, RawSortPin>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAccessGrant {
    pub event: String,
    pub grants: IdListRepr,
    pub family: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RawSortPin {
    First,
    Last,
}

/// A list of identifiers given either as an array or a comma-joined string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdListRepr {
    List(Vec<String>),
    Joined(String),
}

impl IdListRepr {
    pub fn into_names(self) -> Vec<String> {
        let names: Vec<String> = match self {
            Self::List(list) => list,
            Self::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        };
        names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

pub(crate) fn names_of(list: Option<IdListRepr>) -> Vec<String> {
    list.map(IdListRepr::into_names).unwrap_or_default()
}

/// A multiplier given as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum MultiplierRepr {
    Number(f64),
    Text(String),
}

impl MultiplierRepr {
    /// Positive, finite multiplier value; `None` for anything else.
    pub fn positive_value(&self) -> Option<f64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        (value.is_finite() && value > 0.0).then_some(value)
    }
}

/// Canonical spelling for definition ids (contexts, runes, events, presets).
pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
