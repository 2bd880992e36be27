//! Per-run compiled plan: every item's odds plus the three draw tables.
use serde::{Deserialize, Serialize};

use super::table::{TableEntry, WeightedTable};
use crate::catalog::{Catalog, ContextId, Item, ItemId};
use crate::constants::DEBUG_ENV_VAR;
use crate::context::EvaluationContext;
use crate::numbers::u64_to_f64;
use crate::odds::{self, CompiledOdds};
use crate::rng::Sfc32;

fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

/// Which table an item rolls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Preset-gated items, rolled before anything else at face value.
    Preroll,
    /// Items whose threshold ignores the player's luck.
    LuckIndependent,
    LuckScaled,
}

/// Compiled state of one reachable item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedItem {
    pub item: ItemId,
    pub effective_chance: u64,
    pub breakthrough: Option<ContextId>,
    pub lane: Lane,
    pub ratio: f64,
}

/// Closed-form probability of each phase of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDistribution {
    pub preroll: f64,
    pub luck_independent: f64,
    pub luck_scaled: f64,
    pub no_win: f64,
}

impl OutcomeDistribution {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preroll + self.luck_independent + self.luck_scaled + self.no_win
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollPlan {
    odds: Vec<CompiledOdds>,
    planned: Vec<Option<PlannedItem>>,
    preroll: WeightedTable,
    luck_independent: WeightedTable,
    luck_scaled: WeightedTable,
    luck: f64,
}

impl RollPlan {
    /// Compile every catalog item against `context`.
    #[must_use]
    pub fn compile(catalog: &Catalog, context: &EvaluationContext) -> Self {
        let luck = context.luck();
        let trace = debug_log_enabled();
        let mut odds_by_item = Vec::with_capacity(catalog.len());
        let mut planned = Vec::with_capacity(catalog.len());
        let mut preroll = Vec::new();
        let mut luck_independent = Vec::new();
        let mut luck_scaled = Vec::new();

        for item in catalog.items() {
            let compiled = odds::compile(catalog, item, context);
            odds_by_item.push(compiled);
            let Some(chance) = compiled.chance.get() else {
                if trace {
                    log::debug!("{}: unreachable ({:?})", item.name, compiled.chance);
                }
                planned.push(None);
                continue;
            };
            let (lane, ratio) = lane_and_ratio(item, chance, luck);
            if trace {
                log::debug!("{}: 1 in {chance} via {lane:?}, ratio {ratio:e}", item.name);
            }
            let entry = TableEntry {
                item: item.id,
                effective_chance: chance,
                ratio,
            };
            match lane {
                Lane::Preroll => preroll.push(entry),
                Lane::LuckIndependent => luck_independent.push(entry),
                Lane::LuckScaled => luck_scaled.push(entry),
            }
            planned.push(Some(PlannedItem {
                item: item.id,
                effective_chance: chance,
                breakthrough: compiled.breakthrough,
                lane,
                ratio,
            }));
        }

        let plan = Self {
            odds: odds_by_item,
            planned,
            preroll: WeightedTable::build(preroll),
            luck_independent: WeightedTable::build(luck_independent),
            luck_scaled: WeightedTable::build(luck_scaled),
            luck,
        };
        log::debug!(
            "plan compiled: {} reachable ({} preroll, {} luckless, {} scaled)",
            plan.reachable().count(),
            plan.preroll.len(),
            plan.luck_independent.len(),
            plan.luck_scaled.len()
        );
        plan
    }

    /// One trial: preroll, then the luck-independent table, then the
    /// luck-scaled table. Stops at the first hit.
    pub fn draw(&self, rng: &mut Sfc32) -> Option<ItemId> {
        self.preroll
            .sample(rng)
            .or_else(|| self.luck_independent.sample(rng))
            .or_else(|| self.luck_scaled.sample(rng))
    }

    #[must_use]
    pub fn odds(&self, item: ItemId) -> Option<&CompiledOdds> {
        self.odds.get(item.index())
    }

    #[must_use]
    pub fn planned(&self, item: ItemId) -> Option<&PlannedItem> {
        self.planned.get(item.index()).and_then(Option::as_ref)
    }

    /// Whether a win on `item` counts as a breakthrough win.
    #[must_use]
    pub fn via_breakthrough(&self, item: ItemId) -> bool {
        self.planned(item)
            .is_some_and(|planned| planned.breakthrough.is_some())
    }

    pub fn reachable(&self) -> impl Iterator<Item = &PlannedItem> {
        self.planned.iter().flatten()
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.planned.len()
    }

    #[must_use]
    pub const fn luck(&self) -> f64 {
        self.luck
    }

    #[must_use]
    pub fn outcome_distribution(&self) -> OutcomeDistribution {
        let preroll_miss = self.preroll.residual();
        let luckless_miss = self.luck_independent.residual();
        OutcomeDistribution {
            preroll: self.preroll.total(),
            luck_independent: preroll_miss * self.luck_independent.total(),
            luck_scaled: preroll_miss * luckless_miss * self.luck_scaled.total(),
            no_win: preroll_miss * luckless_miss * self.luck_scaled.residual(),
        }
    }
}

fn lane_and_ratio(item: &Item, chance: u64, luck: f64) -> (Lane, f64) {
    let chance_f = u64_to_f64(chance);
    if item.is_preset_gated() {
        return (Lane::Preroll, 1.0 / chance_f);
    }
    if item.ignore_luck {
        let threshold = u64_to_f64(item.fixed_roll_threshold.unwrap_or(1));
        return (Lane::LuckIndependent, threshold.min(chance_f) / chance_f);
    }
    (Lane::LuckScaled, luck.min(chance_f) / chance_f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::small_catalog;
    use crate::context::{Selection, resolve};

    fn plan_for(catalog: &Catalog, selection: &Selection) -> RollPlan {
        RollPlan::compile(catalog, &resolve(catalog, selection).unwrap())
    }

    #[test]
    fn items_land_in_their_lanes() {
        let catalog = small_catalog();
        let plan = plan_for(
            &catalog,
            &Selection::new("NORMAL", 1_000_000.0).with_preset("OBLIVION"),
        );
        let lane = |name: &str| {
            plan.planned(catalog.item_by_name(name).unwrap().id)
                .map(|planned| planned.lane)
        };
        assert_eq!(lane("Memory"), Some(Lane::Preroll));
        assert_eq!(lane("Fixed"), Some(Lane::LuckIndependent));
        assert_eq!(lane("Common"), Some(Lane::LuckScaled));
        assert_eq!(lane("Wind"), None);
    }

    #[test]
    fn luck_ratio_caps_at_certainty() {
        let catalog = small_catalog();
        let plan = plan_for(&catalog, &Selection::new("NORMAL", 10.0));
        let common = plan
            .planned(catalog.item_by_name("Common").unwrap().id)
            .unwrap();
        assert!((common.ratio - 1.0).abs() < f64::EPSILON);
        let rift = plan
            .planned(catalog.item_by_name("Rift").unwrap().id)
            .unwrap();
        assert!((rift.ratio - 10.0 / 777.0).abs() < 1e-12);
    }

    #[test]
    fn outcome_distribution_is_a_probability_split() {
        let catalog = small_catalog();
        for luck in [0.0, 1.0, 2.5, 1_000.0, 1e9] {
            let plan = plan_for(
                &catalog,
                &Selection::new("WINDY", luck)
                    .with_preset("OBLIVION")
                    .with_event("HALLOWEEN"),
            );
            let dist = plan.outcome_distribution();
            assert!((dist.total() - 1.0).abs() < 1e-9, "luck {luck}: {dist:?}");
        }
    }

    #[test]
    fn zero_luck_only_rolls_fixed_thresholds() {
        let catalog = small_catalog();
        let plan = plan_for(&catalog, &Selection::new("NORMAL", 0.0));
        let dist = plan.outcome_distribution();
        assert!(dist.luck_scaled.abs() < f64::EPSILON);
        assert!((dist.luck_independent - 1.0 / 50.0).abs() < 1e-12);
    }

    #[test]
    fn draw_is_deterministic_for_a_seed() {
        let catalog = small_catalog();
        let plan = plan_for(&catalog, &Selection::new("NORMAL", 3.0));
        let mut one = Sfc32::from_user_seed(9);
        let mut two = Sfc32::from_user_seed(9);
        let first: Vec<_> = (0..500).map(|_| plan.draw(&mut one)).collect();
        let second: Vec<_> = (0..500).map(|_| plan.draw(&mut two)).collect();
        assert_eq!(first, second);
        assert!(first.iter().any(Option::is_some));
    }
}
