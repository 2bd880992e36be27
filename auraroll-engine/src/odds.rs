//! Per-item odds compilation.
//!
//! Given one item and an evaluation context, decide whether the item can be
//! rolled at all and, if so, its effective "1 in N" chance. Gating runs in a
//! fixed order: presets, events, hard exclusions, native contexts, then the
//! breakthrough search.
use std::num::NonZeroU64;

use crate::catalog::{Catalog, ContextId, Item};
use crate::context::{ContextView, EvaluationContext};
use crate::numbers::divide_chance;

/// Why an item was dropped from the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    PresetInactive,
    LuckBelowPreset,
    EventDisabled,
    HardExcluded,
    OffContext,
}

/// Effective chance of an item; reachable items never report zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveChance {
    Reachable(NonZeroU64),
    Unreachable(Gate),
}

impl EffectiveChance {
    /// Reachable chance, clamping anything below one up to one.
    #[must_use]
    pub fn clamped(chance: u64) -> Self {
        Self::Reachable(NonZeroU64::new(chance).unwrap_or(NonZeroU64::MIN))
    }

    #[must_use]
    pub const fn get(self) -> Option<u64> {
        match self {
            Self::Reachable(chance) => Some(chance.get()),
            Self::Unreachable(_) => None,
        }
    }

    #[must_use]
    pub const fn is_reachable(self) -> bool {
        matches!(self, Self::Reachable(_))
    }
}

/// Compiled odds for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledOdds {
    pub chance: EffectiveChance,
    /// Context whose multiplier set the chance, if any.
    pub breakthrough: Option<ContextId>,
}

impl CompiledOdds {
    const fn unreachable(gate: Gate) -> Self {
        Self {
            chance: EffectiveChance::Unreachable(gate),
            breakthrough: None,
        }
    }
}

/// Compile the odds of `item` under `context`.
#[must_use]
pub fn compile(catalog: &Catalog, item: &Item, context: &EvaluationContext) -> CompiledOdds {
    let mut base = item.base_chance;
    for preset_id in &item.requires_presets {
        if !context.is_preset_active(*preset_id) {
            return CompiledOdds::unreachable(Gate::PresetInactive);
        }
        let preset = catalog.preset(*preset_id);
        if context.luck() < preset.min_luck {
            return CompiledOdds::unreachable(Gate::LuckBelowPreset);
        }
        if let Some(fixed) = preset.fixed_chance {
            base = fixed;
        }
    }

    if let Some(event) = item.event
        && !context.is_event_enabled(event)
    {
        return CompiledOdds::unreachable(Gate::EventDisabled);
    }

    let overrides = catalog.overrides();
    let view = context.view(overrides.uses_base_contexts(item.id));
    if overrides.is_hard_excluded(item.id, view.active) {
        return CompiledOdds::unreachable(Gate::HardExcluded);
    }

    if !item.native_contexts.is_empty()
        && !item.native_contexts.iter().any(|ctx| view.active.contains(ctx))
        && !event_grants_access(catalog, item, context, &view)
    {
        return CompiledOdds::unreachable(Gate::OffContext);
    }

    let (chance, breakthrough) = breakthrough_chance(catalog, item, base, &view)
        .map_or((base, None), |(chance, ctx)| (chance, Some(ctx)));
    CompiledOdds {
        chance: EffectiveChance::clamped(chance),
        breakthrough,
    }
}

fn event_grants_access(
    catalog: &Catalog,
    item: &Item,
    context: &EvaluationContext,
    view: &ContextView<'_>,
) -> bool {
    catalog.overrides().access_grants().iter().any(|grant| {
        context.is_event_enabled(grant.event)
            && view.active.iter().any(|ctx| {
                catalog.context(*ctx).family.as_deref() == Some(grant.family.as_str())
            })
            && item.native_contexts.iter().any(|ctx| grant.grants.contains(ctx))
    })
}

fn breakthrough_chance(
    catalog: &Catalog,
    item: &Item,
    base: u64,
    view: &ContextView<'_>,
) -> Option<(u64, ContextId)> {
    if item.breakthroughs.is_empty() {
        return None;
    }
    let overrides = catalog.overrides();
    if view.aggregate && !overrides.blocks_aggregate(item.id) {
        // Lowest divided chance wins; ties keep the first listed context.
        let best = item
            .breakthroughs
            .iter()
            .filter(|(ctx, _)| !overrides.aggregate_skips(*ctx))
            .map(|(ctx, multiplier)| (divide_chance(base, *multiplier).max(1), *ctx))
            .reduce(|best, next| if next.0 < best.0 { next } else { best });
        if best.is_some() {
            return best;
        }
    }
    view.search_order.iter().find_map(|ctx| {
        item.breakthrough_for(*ctx)
            .map(|multiplier| (divide_chance(base, multiplier).max(1), *ctx))
    })
}
