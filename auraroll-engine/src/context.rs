//! Turns raw host selections into an immutable evaluation context.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::catalog::{Catalog, ContextId, ContextSet, EventId, PresetId, RuneId, push_unique};

/// Errors raised when a selection names something the catalog lacks.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    #[error("unknown context {0:?}")]
    UnknownContext(String),
    #[error("unknown rune {0:?}")]
    UnknownRune(String),
    #[error("context {0:?} is not a time-of-day modifier")]
    NotTimeModifier(String),
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
    #[error("luck must be a finite value >= 0 (got {0})")]
    InvalidLuck(f64),
}

/// Host-side selection snapshot, taken once when a run starts.
///
/// `None`, empty strings and `"none"` all mean "not selected".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub rune: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub presets: Vec<String>,
    #[serde(default)]
    pub luck: f64,
}

impl Selection {
    #[must_use]
    pub fn new(primary: &str, luck: f64) -> Self {
        Self {
            primary: Some(primary.to_string()),
            luck,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_rune(mut self, rune: &str) -> Self {
        self.rune = Some(rune.to_string());
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: &str) -> Self {
        self.time = Some(time.to_string());
        self
    }

    #[must_use]
    pub fn with_event(mut self, event: &str) -> Self {
        self.events.push(event.to_string());
        self
    }

    #[must_use]
    pub fn with_preset(mut self, preset: &str) -> Self {
        self.presets.push(preset.to_string());
        self
    }
}

/// Contexts an item is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ContextView<'a> {
    pub active: &'a [ContextId],
    pub search_order: &'a [ContextId],
    pub aggregate: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ContextLayer {
    active: ContextSet,
    search_order: ContextSet,
    aggregate: bool,
}

impl ContextLayer {
    fn view(&self) -> ContextView<'_> {
        ContextView {
            active: &self.active,
            search_order: &self.search_order,
            aggregate: self.aggregate,
        }
    }
}

/// Normalized, immutable description of one run's environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    canonical: ContextId,
    full: ContextLayer,
    base: ContextLayer,
    enabled_events: SmallVec<[EventId; 4]>,
    active_presets: SmallVec<[PresetId; 2]>,
    luck: f64,
}

impl EvaluationContext {
    #[must_use]
    pub const fn canonical(&self) -> ContextId {
        self.canonical
    }

    /// Active contexts including everything the rune implies.
    #[must_use]
    pub fn active(&self) -> &[ContextId] {
        &self.full.active
    }

    #[must_use]
    pub fn breakthrough_search_order(&self) -> &[ContextId] {
        &self.full.search_order
    }

    /// Active contexts from the environment alone.
    #[must_use]
    pub fn base_active(&self) -> &[ContextId] {
        &self.base.active
    }

    #[must_use]
    pub fn base_search_order(&self) -> &[ContextId] {
        &self.base.search_order
    }

    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        self.full.aggregate
    }

    /// View for an item; `base_only` items ignore the rune.
    #[must_use]
    pub fn view(&self, base_only: bool) -> ContextView<'_> {
        if base_only {
            self.base.view()
        } else {
            self.full.view()
        }
    }

    #[must_use]
    pub fn enabled_events(&self) -> &[EventId] {
        &self.enabled_events
    }

    #[must_use]
    pub fn is_event_enabled(&self, event: EventId) -> bool {
        self.enabled_events.contains(&event)
    }

    #[must_use]
    pub fn active_presets(&self) -> &[PresetId] {
        &self.active_presets
    }

    #[must_use]
    pub fn is_preset_active(&self, preset: PresetId) -> bool {
        self.active_presets.contains(&preset)
    }

    #[must_use]
    pub const fn luck(&self) -> f64 {
        self.luck
    }

    /// Same context with a different luck figure.
    #[must_use]
    pub fn with_luck(mut self, luck: f64) -> Self {
        self.luck = luck;
        self
    }

    /// Whether every id in this context exists in `catalog`.
    #[must_use]
    pub fn fits(&self, catalog: &Catalog) -> bool {
        let context_count = catalog.contexts().count();
        let event_count = catalog.events().count();
        let preset_count = catalog.presets().count();
        self.full
            .active
            .iter()
            .chain(&self.full.search_order)
            .chain(std::iter::once(&self.canonical))
            .all(|ctx| ctx.index() < context_count)
            && self.enabled_events.iter().all(|e| e.index() < event_count)
            && self.active_presets.iter().all(|p| p.index() < preset_count)
    }
}

fn explicit(value: Option<&String>) -> Option<&str> {
    value
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty() && !raw.eq_ignore_ascii_case("none"))
}

fn lookup_context(catalog: &Catalog, name: &str) -> Result<ContextId, SelectionError> {
    catalog
        .context_id(name)
        .ok_or_else(|| SelectionError::UnknownContext(name.to_string()))
}

fn any_aggregate(catalog: &Catalog, contexts: &[ContextId]) -> bool {
    contexts.iter().any(|ctx| catalog.context(*ctx).aggregate)
}

/// Resolve a host selection against `catalog`.
///
/// # Errors
///
/// Returns an error if any selected id is unknown or luck is invalid.
pub fn resolve(
    catalog: &Catalog,
    selection: &Selection,
) -> Result<EvaluationContext, SelectionError> {
    if !selection.luck.is_finite() || selection.luck < 0.0 {
        return Err(SelectionError::InvalidLuck(selection.luck));
    }

    let default = catalog.default_context();
    let primary = explicit(selection.primary.as_ref())
        .map(|name| lookup_context(catalog, name))
        .transpose()?;
    let time = explicit(selection.time.as_ref())
        .map(|name| {
            let id = lookup_context(catalog, name)?;
            if catalog.context(id).time {
                Ok(id)
            } else {
                Err(SelectionError::NotTimeModifier(name.to_string()))
            }
        })
        .transpose()?;
    let rune: Option<RuneId> = explicit(selection.rune.as_ref())
        .map(|name| {
            catalog
                .rune_id(name)
                .ok_or_else(|| SelectionError::UnknownRune(name.to_string()))
        })
        .transpose()?;

    let canonical = match (primary, time) {
        (Some(primary), _) if primary != default => primary,
        (_, Some(time)) => time,
        (Some(primary), None) => primary,
        (None, None) => default,
    };

    let mut base_active = ContextSet::new();
    push_unique(&mut base_active, canonical);
    for ctx in primary.into_iter().chain(time) {
        push_unique(&mut base_active, ctx);
    }

    let mut base_order = ContextSet::new();
    for ctx in primary.into_iter().chain(time).chain(std::iter::once(canonical)) {
        push_unique(&mut base_order, ctx);
    }

    let (implied, excluded) = rune.map_or_else(
        || (ContextSet::new(), ContextSet::new()),
        |rune| {
            let def = catalog.rune(rune);
            (def.implies.clone(), def.excludes.clone())
        },
    );

    let mut active = base_active.clone();
    for ctx in &implied {
        push_unique(&mut active, *ctx);
    }
    active.retain(|ctx| *ctx == canonical || !excluded.contains(ctx));

    let mut search_order = ContextSet::new();
    for ctx in implied.iter().copied().chain(base_order.iter().copied()) {
        push_unique(&mut search_order, ctx);
    }

    let mut enabled_events = SmallVec::new();
    for name in &selection.events {
        let Some(name) = explicit(Some(name)) else {
            continue;
        };
        let id = catalog
            .event_id(name)
            .ok_or_else(|| SelectionError::UnknownEvent(name.to_string()))?;
        push_unique(&mut enabled_events, id);
    }

    let mut active_presets = SmallVec::new();
    for name in &selection.presets {
        let Some(name) = explicit(Some(name)) else {
            continue;
        };
        let id = catalog
            .preset_id(name)
            .ok_or_else(|| SelectionError::UnknownPreset(name.to_string()))?;
        push_unique(&mut active_presets, id);
    }

    let full = ContextLayer {
        aggregate: any_aggregate(catalog, &active),
        active,
        search_order,
    };
    let base = ContextLayer {
        aggregate: any_aggregate(catalog, &base_active),
        active: base_active,
        search_order: base_order,
    };

    Ok(EvaluationContext {
        canonical,
        full,
        base,
        enabled_events,
        active_presets,
        luck: selection.luck,
    })
}
