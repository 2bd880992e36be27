//! Per-item special cases, attached to the catalog at load time.
//!
//! The odds compiler consults these tables uniformly instead of branching on
//! item names.

use std::collections::{HashMap, HashSet};

use super::{ContextId, ContextSet, EventId, ItemId};

/// Where an item is pinned in the result listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortPin {
    First,
    Last,
}

/// An event that opens off-context natives while a context of `family` is active.
#[derive(Debug, Clone, PartialEq)]
pub struct EventAccessGrant {
    pub event: EventId,
    pub grants: ContextSet,
    pub family: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemOverrides {
    pub(crate) base_context_items: HashSet<ItemId>,
    pub(crate) context_exclusions: HashMap<ItemId, ContextSet>,
    pub(crate) aggregate_blocklist: HashSet<ItemId>,
    pub(crate) aggregate_excluded_contexts: ContextSet,
    pub(crate) event_access_grants: Vec<EventAccessGrant>,
    pub(crate) sort_pins: HashMap<ItemId, SortPin>,
}

impl ItemOverrides {
    /// Items resolved against the environment only, ignoring runes.
    #[must_use]
    pub fn uses_base_contexts(&self, item: ItemId) -> bool {
        self.base_context_items.contains(&item)
    }

    /// Whether `item` is barred from any context in `active`.
    #[must_use]
    pub fn is_hard_excluded(&self, item: ItemId, active: &[ContextId]) -> bool {
        self.context_exclusions
            .get(&item)
            .is_some_and(|barred| barred.iter().any(|ctx| active.contains(ctx)))
    }

    #[must_use]
    pub fn blocks_aggregate(&self, item: ItemId) -> bool {
        self.aggregate_blocklist.contains(&item)
    }

    /// Breakthrough contexts never combined in aggregate mode.
    #[must_use]
    pub fn aggregate_skips(&self, context: ContextId) -> bool {
        self.aggregate_excluded_contexts.contains(&context)
    }

    #[must_use]
    pub fn access_grants(&self) -> &[EventAccessGrant] {
        &self.event_access_grants
    }

    #[must_use]
    pub fn sort_pin(&self, item: ItemId) -> Option<SortPin> {
        self.sort_pins.get(&item).copied()
    }
}
