//! Win counters for one run, indexed by item id.
use crate::catalog::ItemId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinTally {
    wins: Vec<u64>,
    breakthrough_wins: Vec<u64>,
    no_win: u64,
    processed: u64,
}

impl WinTally {
    #[must_use]
    pub fn new(item_count: usize) -> Self {
        Self {
            wins: vec![0; item_count],
            breakthrough_wins: vec![0; item_count],
            no_win: 0,
            processed: 0,
        }
    }

    /// Count one trial that produced `item`.
    pub fn record_win(&mut self, item: ItemId, via_breakthrough: bool) {
        let slot = item.index();
        self.wins[slot] += 1;
        if via_breakthrough {
            self.breakthrough_wins[slot] += 1;
        }
        self.processed += 1;
    }

    pub fn record_no_win(&mut self) {
        self.no_win += 1;
        self.processed += 1;
    }

    #[must_use]
    pub fn wins(&self, item: ItemId) -> u64 {
        self.wins.get(item.index()).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn breakthrough_wins(&self, item: ItemId) -> u64 {
        self.breakthrough_wins
            .get(item.index())
            .copied()
            .unwrap_or(0)
    }

    /// Wins that used the item's unmodified chance.
    #[must_use]
    pub fn base_wins(&self, item: ItemId) -> u64 {
        self.wins(item) - self.breakthrough_wins(item)
    }

    #[must_use]
    pub fn total_wins(&self) -> u64 {
        self.wins.iter().sum()
    }

    #[must_use]
    pub const fn no_win(&self) -> u64 {
        self.no_win
    }

    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.processed
    }

    /// Items with at least one win, in id order.
    pub fn winners(&self) -> impl Iterator<Item = (ItemId, u64)> + '_ {
        self.wins
            .iter()
            .enumerate()
            .filter(|(_, wins)| **wins > 0)
            .filter_map(|(idx, wins)| u32::try_from(idx).ok().map(|idx| (ItemId::new(idx), *wins)))
    }
}
