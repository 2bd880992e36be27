//! Flattened sequential-exclusion tables.
//!
//! A table is walked, conceptually, from its rarest entry to its most common,
//! each entry getting one independent attempt until one hits. The chance that
//! entry `i` wins is `ratio_i * prod(1 - ratio_j)` over the entries before it,
//! so the whole walk collapses to a single uniform draw over cumulative
//! absolute weights.
use crate::catalog::ItemId;
use crate::rng::Sfc32;

/// One reachable item and its per-attempt success ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEntry {
    pub item: ItemId,
    pub effective_chance: u64,
    pub ratio: f64,
}

/// Absolute weights of each entry under sequential exclusion.
///
/// Entries are taken in the order given.
#[must_use]
pub fn sequential_weights(ratios: &[f64]) -> (Vec<f64>, f64) {
    let mut remaining = 1.0_f64;
    let mut weights = Vec::with_capacity(ratios.len());
    for ratio in ratios {
        let ratio = ratio.clamp(0.0, 1.0);
        weights.push(remaining * ratio);
        remaining *= 1.0 - ratio;
    }
    (weights, remaining)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedTable {
    items: Vec<ItemId>,
    cumulative: Vec<f64>,
    residual: f64,
}

impl WeightedTable {
    /// Build a table, ordering entries by descending effective chance.
    ///
    /// Ties keep their incoming order, so callers pass catalog order.
    #[must_use]
    pub fn build(mut entries: Vec<TableEntry>) -> Self {
        entries.sort_by(|a, b| b.effective_chance.cmp(&a.effective_chance));
        let ratios: Vec<f64> = entries.iter().map(|entry| entry.ratio).collect();
        let (weights, residual) = sequential_weights(&ratios);

        let mut items = Vec::with_capacity(entries.len());
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut running = 0.0;
        for (entry, weight) in entries.iter().zip(weights) {
            if weight <= 0.0 {
                continue;
            }
            running += weight;
            items.push(entry.item);
            cumulative.push(running);
        }
        Self {
            items,
            cumulative,
            residual: if entries.is_empty() { 1.0 } else { residual },
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Probability that a draw selects any entry.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Probability that every entry misses.
    #[must_use]
    pub const fn residual(&self) -> f64 {
        self.residual
    }

    /// Item order after sorting, rarest first.
    #[must_use]
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Map a uniform `u` in `[0, 1)` to an entry; `None` past the total.
    #[must_use]
    pub fn pick(&self, u: f64) -> Option<ItemId> {
        if u >= self.total() {
            return None;
        }
        let idx = self.cumulative.partition_point(|&c| c <= u);
        self.items.get(idx).copied()
    }

    /// One draw; empty tables leave the generator untouched.
    pub fn sample(&self, rng: &mut Sfc32) -> Option<ItemId> {
        if self.items.is_empty() {
            return None;
        }
        self.pick(rng.next_f64())
    }
}
