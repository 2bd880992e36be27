//! Immutable aura catalog.
//!
//! Built once from static JSON, normalized into interned ids and arena
//! indexed items. Authoring mistakes (duplicate names, bad chances, dangling
//! references) are construction errors, never runtime conditions.

mod overrides;
mod raw;

use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::sync::OnceLock;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::numbers::floor_f64_to_u64;
use raw::{RawCatalog, RawItem, RawOverrides, RawSortPin, names_of, normalize_key};

pub use overrides::{EventAccessGrant, ItemOverrides, SortPin};

const BUILTIN_CATALOG_DATA: &str = include_str!("../../data/catalog.json");

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name($repr);

        impl $name {
            #[must_use]
            pub const fn new(raw: $repr) -> Self {
                Self(raw)
            }

            /// Arena slot of this id.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

interned_id!(
    /// Context ("biome") identifier.
    ContextId(u16)
);
interned_id!(
    /// Secondary modifier ("rune") identifier.
    RuneId(u16)
);
interned_id!(EventId(u16));
interned_id!(PresetId(u16));
interned_id!(
    /// Stable position of an item in the catalog.
    ItemId(u32)
);

/// Ordered, duplicate-free list of contexts.
pub type ContextSet = SmallVec<[ContextId; 4]>;

pub(crate) fn push_unique<A>(set: &mut SmallVec<A>, value: A::Item)
where
    A: smallvec::Array,
    A::Item: PartialEq,
{
    if !set.contains(&value) {
        set.push(value);
    }
}

/// Errors raised while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate item name {0:?}")]
    DuplicateItem(String),
    #[error("item {name:?} has invalid base chance {value} (expected an integer >= 1)")]
    InvalidChance { name: String, value: f64 },
    #[error("item {name:?} has a fixed roll threshold of zero")]
    InvalidThreshold { name: String },
    #[error("preset {id:?} is invalid: {reason}")]
    InvalidPreset { id: String, reason: &'static str },
    #[error("duplicate {kind} definition {id:?}")]
    DuplicateDefinition { kind: &'static str, id: String },
    #[error("too many {kind} definitions")]
    TooManyDefinitions { kind: &'static str },
    #[error("{owner} references unknown {kind} {id:?}")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        id: String,
    },
    #[error("default context {0:?} is not defined")]
    MissingDefault(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDef {
    pub id: String,
    /// Unions the breakthroughs of many contexts instead of picking one.
    pub aggregate: bool,
    pub family: Option<String>,
    /// Time-of-day modifier rather than an environment.
    pub time: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuneDef {
    pub id: String,
    pub implies: ContextSet,
    pub excludes: ContextSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresetDef {
    pub id: String,
    /// Gated items only enter the table at or above this luck.
    pub min_luck: f64,
    /// Replaces the base chance of every item the preset gates.
    pub fixed_chance: Option<u64>,
}

/// Presentation metadata carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    pub disable_rarity_class: bool,
    pub cutscene: Option<String>,
    pub description: Option<String>,
}

/// A single catalog entry ("aura").
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// One success per `base_chance` draws; always >= 1.
    pub base_chance: u64,
    /// Empty means available everywhere.
    pub native_contexts: ContextSet,
    pub breakthroughs: SmallVec<[(ContextId, f64); 4]>,
    pub ignore_luck: bool,
    pub fixed_roll_threshold: Option<u64>,
    pub requires_presets: SmallVec<[PresetId; 2]>,
    pub event: Option<EventId>,
    pub presentation: Presentation,
}

impl Item {
    /// Multiplier registered for `context`, if any.
    #[must_use]
    pub fn breakthrough_for(&self, context: ContextId) -> Option<f64> {
        self.breakthroughs
            .iter()
            .find(|(ctx, _)| *ctx == context)
            .map(|(_, multiplier)| *multiplier)
    }

    #[must_use]
    pub fn is_preset_gated(&self) -> bool {
        !self.requires_presets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Registry<T> {
    defs: Vec<T>,
    index: HashMap<String, u16>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            defs: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    fn insert(&mut self, kind: &'static str, key: String, def: T) -> Result<u16, CatalogError> {
        let slot =
            u16::try_from(self.defs.len()).map_err(|_| CatalogError::TooManyDefinitions { kind })?;
        if self.index.contains_key(&key) {
            return Err(CatalogError::DuplicateDefinition { kind, id: key });
        }
        self.index.insert(key, slot);
        self.defs.push(def);
        Ok(slot)
    }

    fn lookup(&self, raw: &str) -> Option<u16> {
        self.index.get(&normalize_key(raw)).copied()
    }

    fn require(&self, owner: &str, kind: &'static str, raw: &str) -> Result<u16, CatalogError> {
        self.lookup(raw).ok_or_else(|| CatalogError::UnknownReference {
            owner: owner.to_string(),
            kind,
            id: raw.to_string(),
        })
    }
}

/// The immutable item table plus every definition it references.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    contexts: Registry<ContextDef>,
    runes: Registry<RuneDef>,
    events: Registry<EventDef>,
    presets: Registry<PresetDef>,
    default_context: ContextId,
    items: Vec<Item>,
    item_index: HashMap<String, ItemId>,
    overrides: ItemOverrides,
}

impl Catalog {
    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or violates catalog invariants.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Build the catalog shipped with the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded catalog data is invalid.
    pub fn load_builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG_DATA)
    }

    fn from_raw(raw: RawCatalog) -> Result<Self, CatalogError> {
        let mut contexts = Registry::default();
        for ctx in raw.contexts {
            let key = normalize_key(&ctx.id);
            let def = ContextDef {
                id: key.clone(),
                aggregate: ctx.aggregate,
                family: ctx.family.as_deref().map(normalize_key),
                time: ctx.time,
            };
            contexts.insert("context", key, def)?;
        }
        let default_context = contexts
            .lookup(&raw.default_context)
            .map(ContextId)
            .ok_or_else(|| CatalogError::MissingDefault(raw.default_context.clone()))?;

        let mut runes = Registry::default();
        for rune in raw.runes {
            let key = normalize_key(&rune.id);
            let owner = format!("rune {key}");
            let implies = resolve_contexts(&contexts, &owner, names_of(rune.implies))?;
            let excludes = resolve_contexts(&contexts, &owner, names_of(rune.excludes))?;
            let def = RuneDef {
                id: key.clone(),
                implies,
                excludes,
            };
            runes.insert("rune", key, def)?;
        }

        let mut events = Registry::default();
        for event in raw.events {
            let key = normalize_key(&event.id);
            let def = EventDef {
                id: key.clone(),
                name: event.name,
            };
            events.insert("event", key, def)?;
        }

        let mut presets = Registry::default();
        for preset in raw.presets {
            let key = normalize_key(&preset.id);
            if !preset.min_luck.is_finite() || preset.min_luck < 0.0 {
                return Err(CatalogError::InvalidPreset {
                    id: key,
                    reason: "min_luck must be a finite value >= 0",
                });
            }
            if preset.fixed_chance == Some(0) {
                return Err(CatalogError::InvalidPreset {
                    id: key,
                    reason: "fixed_chance must be >= 1",
                });
            }
            let def = PresetDef {
                id: key.clone(),
                min_luck: preset.min_luck,
                fixed_chance: preset.fixed_chance,
            };
            presets.insert("preset", key, def)?;
        }

        let mut items = Vec::with_capacity(raw.items.len());
        let mut item_index = HashMap::with_capacity(raw.items.len());
        for raw_item in raw.items {
            let id = u32::try_from(items.len())
                .map(ItemId)
                .map_err(|_| CatalogError::TooManyDefinitions { kind: "item" })?;
            let item = build_item(id, raw_item, &contexts, &events, &presets)?;
            if item_index.insert(item.name.clone(), id).is_some() {
                return Err(CatalogError::DuplicateItem(item.name));
            }
            items.push(item);
        }

        let overrides = build_overrides(raw.overrides, &item_index, &contexts, &events)?;

        let catalog = Self {
            contexts,
            runes,
            events,
            presets,
            default_context,
            items,
            item_index,
            overrides,
        };
        log::debug!(
            "catalog loaded: {} items, {} contexts, fingerprint {:016x}",
            catalog.items.len(),
            catalog.contexts.defs.len(),
            catalog.fingerprint()
        );
        Ok(catalog)
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn item(&self, id: ItemId) -> &Item {
        &self.items[id.index()]
    }

    #[must_use]
    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.item_index.get(name).map(|id| self.item(*id))
    }

    #[must_use]
    pub const fn default_context(&self) -> ContextId {
        self.default_context
    }

    #[must_use]
    pub fn context(&self, id: ContextId) -> &ContextDef {
        &self.contexts.defs[id.index()]
    }

    #[must_use]
    pub fn context_id(&self, name: &str) -> Option<ContextId> {
        self.contexts.lookup(name).map(ContextId)
    }

    #[must_use]
    pub fn context_name(&self, id: ContextId) -> &str {
        &self.context(id).id
    }

    pub fn contexts(&self) -> impl Iterator<Item = (ContextId, &ContextDef)> {
        self.contexts
            .defs
            .iter()
            .enumerate()
            .filter_map(|(idx, def)| u16::try_from(idx).ok().map(|slot| (ContextId(slot), def)))
    }

    #[must_use]
    pub fn rune(&self, id: RuneId) -> &RuneDef {
        &self.runes.defs[id.index()]
    }

    #[must_use]
    pub fn rune_id(&self, name: &str) -> Option<RuneId> {
        self.runes.lookup(name).map(RuneId)
    }

    pub fn runes(&self) -> impl Iterator<Item = &RuneDef> {
        self.runes.defs.iter()
    }

    #[must_use]
    pub fn event(&self, id: EventId) -> &EventDef {
        &self.events.defs[id.index()]
    }

    #[must_use]
    pub fn event_id(&self, name: &str) -> Option<EventId> {
        self.events.lookup(name).map(EventId)
    }

    pub fn events(&self) -> impl Iterator<Item = &EventDef> {
        self.events.defs.iter()
    }

    #[must_use]
    pub fn preset(&self, id: PresetId) -> &PresetDef {
        &self.presets.defs[id.index()]
    }

    #[must_use]
    pub fn preset_id(&self, name: &str) -> Option<PresetId> {
        self.presets.lookup(name).map(PresetId)
    }

    pub fn presets(&self) -> impl Iterator<Item = &PresetDef> {
        self.presets.defs.iter()
    }

    #[must_use]
    pub const fn overrides(&self) -> &ItemOverrides {
        &self.overrides
    }

    /// Stable digest of every odds-relevant field, for labelling reports.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        for item in &self.items {
            hasher.write(item.name.as_bytes());
            hasher.write_u64(item.base_chance);
            for ctx in &item.native_contexts {
                hasher.write(self.context_name(*ctx).as_bytes());
            }
            for (ctx, multiplier) in &item.breakthroughs {
                hasher.write(self.context_name(*ctx).as_bytes());
                hasher.write_u64(multiplier.to_bits());
            }
            hasher.write_u8(u8::from(item.ignore_luck));
            hasher.write_u64(item.fixed_roll_threshold.unwrap_or(0));
            for preset in &item.requires_presets {
                hasher.write(self.preset(*preset).id.as_bytes());
            }
            if let Some(event) = item.event {
                hasher.write(self.event(event).id.as_bytes());
            }
        }
        hasher.finish()
    }
}

/// Shared built-in catalog.
///
/// # Panics
///
/// Panics when the embedded catalog is corrupt; running with a broken table
/// is never acceptable.
#[must_use]
pub fn builtin_catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(|| {
        Catalog::load_builtin()
            .unwrap_or_else(|err| panic!("built-in aura catalog is invalid: {err}"))
    })
}

fn resolve_contexts(
    contexts: &Registry<ContextDef>,
    owner: &str,
    names: Vec<String>,
) -> Result<ContextSet, CatalogError> {
    let mut set = ContextSet::new();
    for name in names {
        let slot = contexts.require(owner, "context", &name)?;
        push_unique(&mut set, ContextId(slot));
    }
    Ok(set)
}

fn build_item(
    id: ItemId,
    raw: RawItem,
    contexts: &Registry<ContextDef>,
    events: &Registry<EventDef>,
    presets: &Registry<PresetDef>,
) -> Result<Item, CatalogError> {
    let name = raw.name.trim().to_string();
    let chance = raw.chance;
    if !chance.is_finite() || chance < 1.0 || chance.fract() != 0.0 {
        return Err(CatalogError::InvalidChance {
            name,
            value: chance,
        });
    }
    if raw.fixed_roll_threshold == Some(0) {
        return Err(CatalogError::InvalidThreshold { name });
    }
    let owner = format!("item {name}");
    let native_contexts = resolve_contexts(contexts, &owner, names_of(raw.native))?;

    let mut breakthroughs = SmallVec::new();
    for (ctx_name, multiplier) in raw.breakthroughs {
        let slot = contexts.require(&owner, "context", &ctx_name)?;
        match multiplier.positive_value() {
            Some(value) => breakthroughs.push((ContextId(slot), value)),
            None => {
                log::warn!("{owner}: discarding unusable breakthrough multiplier for {ctx_name}");
            }
        }
    }

    let mut requires_presets = SmallVec::new();
    for preset in names_of(raw.requires_presets) {
        let slot = presets.require(&owner, "preset", &preset)?;
        push_unique(&mut requires_presets, PresetId(slot));
    }

    let event = raw
        .event
        .as_deref()
        .map(|event| events.require(&owner, "event", event).map(EventId))
        .transpose()?;

    Ok(Item {
        id,
        base_chance: floor_f64_to_u64(chance),
        name,
        native_contexts,
        breakthroughs,
        ignore_luck: raw.ignore_luck,
        fixed_roll_threshold: raw.fixed_roll_threshold,
        requires_presets,
        event,
        presentation: Presentation {
            disable_rarity_class: raw.disable_rarity_class,
            cutscene: raw.cutscene,
            description: raw.description,
        },
    })
}

fn build_overrides(
    raw: RawOverrides,
    item_index: &HashMap<String, ItemId>,
    contexts: &Registry<ContextDef>,
    events: &Registry<EventDef>,
) -> Result<ItemOverrides, CatalogError> {
    let owner = "overrides";
    let require_item = |name: &str| {
        item_index
            .get(name.trim())
            .copied()
            .ok_or_else(|| CatalogError::UnknownReference {
                owner: owner.to_string(),
                kind: "item",
                id: name.to_string(),
            })
    };

    let base_context_items = raw
        .base_context_items
        .iter()
        .map(|name| require_item(name))
        .collect::<Result<HashSet<_>, _>>()?;

    let mut context_exclusions = HashMap::new();
    for (name, list) in raw.context_exclusions {
        let item = require_item(&name)?;
        let barred = resolve_contexts(contexts, owner, list.into_names())?;
        context_exclusions.insert(item, barred);
    }

    let aggregate_blocklist = raw
        .aggregate_blocklist
        .iter()
        .map(|name| require_item(name))
        .collect::<Result<HashSet<_>, _>>()?;

    let aggregate_excluded_contexts =
        resolve_contexts(contexts, owner, names_of(raw.aggregate_excluded_contexts))?;

    let mut event_access_grants = Vec::with_capacity(raw.event_access_grants.len());
    for grant in raw.event_access_grants {
        let event = EventId(events.require(owner, "event", &grant.event)?);
        let grants = resolve_contexts(contexts, owner, grant.grants.into_names())?;
        event_access_grants.push(EventAccessGrant {
            event,
            grants,
            family: normalize_key(&grant.family),
        });
    }

    let mut sort_pins = HashMap::new();
    for (name, pin) in raw.sort_pins {
        let item = require_item(&name)?;
        let pin = match pin {
            RawSortPin::First => SortPin::First,
            RawSortPin::Last => SortPin::Last,
        };
        sort_pins.insert(item, pin);
    }

    Ok(ItemOverrides {
        base_context_items,
        context_exclusions,
        aggregate_blocklist,
        aggregate_excluded_contexts,
        event_access_grants,
        sort_pins,
    })
}
