//! Turns a completed run's tallies into ordered report rows.
//!
//! Skip predicates only hide rows. They never touch odds or tallies, and
//! rewards are computed over every win.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::catalog::{Catalog, Item, ItemId, SortPin};
use crate::constants::{
    TIER_EPIC_MIN, TIER_EXALTED_MIN, TIER_GLORIOUS_MIN, TIER_LEGENDARY_MIN, TIER_MYTHIC_MIN,
    TIER_TRANSCENDENT_MIN, TIER_UNIQUE_MIN, TRIAL_MILESTONES,
};
use crate::engine::{CompletedRun, OutcomeDistribution};

/// Rarity class derived from an item's base chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Epic,
    Unique,
    Legendary,
    Mythic,
    Exalted,
    Glorious,
    Transcendent,
    /// Items that opt out of rarity classes.
    Special,
}

impl Tier {
    #[must_use]
    pub const fn from_base_chance(chance: u64) -> Self {
        match chance {
            c if c >= TIER_TRANSCENDENT_MIN => Self::Transcendent,
            c if c >= TIER_GLORIOUS_MIN => Self::Glorious,
            c if c >= TIER_EXALTED_MIN => Self::Exalted,
            c if c >= TIER_MYTHIC_MIN => Self::Mythic,
            c if c >= TIER_LEGENDARY_MIN => Self::Legendary,
            c if c >= TIER_UNIQUE_MIN => Self::Unique,
            c if c >= TIER_EPIC_MIN => Self::Epic,
            _ => Self::Basic,
        }
    }

    #[must_use]
    pub fn of(item: &Item) -> Self {
        if item.presentation.disable_rarity_class {
            Self::Special
        } else {
            Self::from_base_chance(item.base_chance)
        }
    }

    /// Experience granted per win.
    #[must_use]
    pub const fn points(self) -> u64 {
        match self {
            Self::Basic => 1,
            Self::Epic => 5,
            Self::Unique => 25,
            Self::Legendary => 100,
            Self::Mythic => 500,
            Self::Exalted => 2_500,
            Self::Glorious => 10_000,
            Self::Transcendent => 50_000,
            Self::Special => 0,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Epic => "Epic",
            Self::Unique => "Unique",
            Self::Legendary => "Legendary",
            Self::Mythic => "Mythic",
            Self::Exalted => "Exalted",
            Self::Glorious => "Glorious",
            Self::Transcendent => "Transcendent",
            Self::Special => "Special",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub name: String,
    pub wins: u64,
    pub breakthrough_wins: u64,
    pub base_wins: u64,
    pub effective_chance: u64,
    pub base_chance: u64,
    pub tier: Tier,
    /// Context whose multiplier applied, if any.
    pub breakthrough: Option<String>,
    #[serde(skip)]
    pin: Option<SortPin>,
}

/// The rarest item won in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarestWin {
    pub name: String,
    pub effective_chance: u64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub experience: u64,
    pub milestones: Vec<u64>,
    pub rarest: Option<RarestWin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollReport {
    pub total: u64,
    pub luck: f64,
    pub total_wins: u64,
    pub no_win: u64,
    /// Wins belonging to rows hidden by the skip predicate.
    pub hidden_wins: u64,
    pub rows: Vec<ResultRow>,
    pub rewards: RewardSummary,
    pub distribution: OutcomeDistribution,
    pub seed: Option<u64>,
}

/// Build the report for `run`, hiding rows for items matched by `skip`.
#[must_use]
pub fn aggregate<F>(catalog: &Catalog, run: &CompletedRun, skip: F) -> RollReport
where
    F: Fn(&Item) -> bool,
{
    let tally = &run.tally;
    let mut rows = Vec::new();
    let mut hidden_wins = 0;
    let mut experience = 0_u64;
    let mut rarest: Option<(u64, &Item)> = None;

    for (id, wins) in tally.winners() {
        let item = catalog.item(id);
        let row = build_row(catalog, run, id, wins);
        experience = experience.saturating_add(row.tier.points().saturating_mul(wins));
        let rarer = rarest.is_none_or(|(chance, best)| {
            row.effective_chance > chance
                || (row.effective_chance == chance && item.name < best.name)
        });
        if rarer {
            rarest = Some((row.effective_chance, item));
        }
        if skip(item) {
            hidden_wins += wins;
        } else {
            rows.push(row);
        }
    }
    rows.sort_by(compare_rows);

    let milestones = TRIAL_MILESTONES
        .iter()
        .copied()
        .filter(|milestone| *milestone <= run.total)
        .collect();
    let rarest = rarest.map(|(effective_chance, item)| RarestWin {
        name: item.name.clone(),
        effective_chance,
        tier: Tier::of(item),
    });

    RollReport {
        total: run.total,
        luck: run.luck(),
        total_wins: tally.total_wins(),
        no_win: tally.no_win(),
        hidden_wins,
        rows,
        rewards: RewardSummary {
            experience,
            milestones,
            rarest,
        },
        distribution: run.plan.outcome_distribution(),
        seed: run.seed,
    }
}

fn build_row(catalog: &Catalog, run: &CompletedRun, id: ItemId, wins: u64) -> ResultRow {
    let item = catalog.item(id);
    let planned = run.plan.planned(id);
    let effective_chance = planned.map_or(item.base_chance, |planned| planned.effective_chance);
    let breakthrough = planned
        .and_then(|planned| planned.breakthrough)
        .map(|ctx| catalog.context_name(ctx).to_string());
    ResultRow {
        name: item.name.clone(),
        wins,
        breakthrough_wins: run.tally.breakthrough_wins(id),
        base_wins: run.tally.base_wins(id),
        effective_chance,
        base_chance: item.base_chance,
        tier: Tier::of(item),
        breakthrough,
        pin: catalog.overrides().sort_pin(id),
    }
}

const fn pin_rank(pin: Option<SortPin>) -> u8 {
    match pin {
        Some(SortPin::First) => 0,
        None => 1,
        Some(SortPin::Last) => 2,
    }
}

fn compare_rows(a: &ResultRow, b: &ResultRow) -> Ordering {
    pin_rank(a.pin)
        .cmp(&pin_rank(b.pin))
        .then_with(|| b.effective_chance.cmp(&a.effective_chance))
        .then_with(|| a.name.cmp(&b.name))
}
