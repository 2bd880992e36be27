//! Aura Roller roll engine
//!
//! Platform-agnostic roll resolution for the Aura Roller probability
//! simulator: catalog, context resolution, odds compilation, a time-sliced
//! Monte-Carlo trial runner and result aggregation. No UI or I/O lives here.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod context;
pub mod engine;
pub mod numbers;
pub mod odds;
pub mod results;
pub mod rng;
pub mod tally;

use std::sync::Arc;

// Re-export commonly used types
pub use catalog::{
    Catalog, CatalogError, ContextDef, ContextId, ContextSet, EventAccessGrant, EventDef, EventId,
    Item, ItemId, ItemOverrides, PresetDef, PresetId, Presentation, RuneDef, RuneId, SortPin,
    builtin_catalog,
};
pub use config::{ConfigError, EngineConfig};
pub use context::{ContextView, EvaluationContext, Selection, SelectionError, resolve};
#[cfg(feature = "async")]
pub use engine::drive_async;
pub use engine::{
    BatchStatus, CancelToken, CancelledRun, Clock, CompletedRun, Lane, NoYield,
    OutcomeDistribution, PlannedItem, RollPlan, RunCallbacks, RunError, RunHandle, RunObserver,
    RunOutcome, RunRequest, RunState, Scheduler, StateCell, SystemClock, TableEntry, ThreadYield,
    TrialRun, WeightedTable, drive, sequential_weights, start_run,
};
pub use odds::{CompiledOdds, EffectiveChance, Gate};
pub use results::{RarestWin, ResultRow, RewardSummary, RollReport, Tier, aggregate};
pub use rng::Sfc32;
pub use tally::WinTally;

/// Trait for abstracting catalog and tuning sources.
/// Hosts provide file- or network-backed implementations.
pub trait CatalogLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the item catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or fails validation.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;

    /// Load engine tuning.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or parsed.
    fn load_config(&self) -> Result<EngineConfig, Self::Error>;
}

/// Loader for the catalog embedded in this crate, with default tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalogLoader;

impl CatalogLoader for BuiltinCatalogLoader {
    type Error = CatalogError;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        Catalog::load_builtin()
    }

    fn load_config(&self) -> Result<EngineConfig, Self::Error> {
        Ok(EngineConfig::default())
    }
}

/// Shared catalog plus tuning; the entry point hosts normally use.
#[derive(Debug, Clone)]
pub struct RollEngine {
    catalog: Arc<Catalog>,
    config: EngineConfig,
}

impl RollEngine {
    /// Build an engine from any loader.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the catalog or config cannot be loaded.
    pub fn load<L: CatalogLoader>(loader: &L) -> Result<Self, L::Error> {
        let catalog = loader.load_catalog()?;
        let config = loader.load_config()?;
        Ok(Self::new(Arc::new(catalog), config))
    }

    #[must_use]
    pub const fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn shared_catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve a selection and build a run request from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the selection names unknown ids.
    pub fn request(&self, selection: &Selection, total: u64) -> Result<RunRequest, RunError> {
        let context = resolve(&self.catalog, selection)?;
        Ok(RunRequest::new(total, selection.luck, context))
    }

    /// Stage a run for a host-driven loop (`drive` or `drive_async`).
    ///
    /// # Errors
    ///
    /// Returns an error if the request or configuration is invalid.
    pub fn prepare(&self, request: RunRequest) -> Result<TrialRun, RunError> {
        TrialRun::new(self.shared_catalog(), request, self.config)
    }

    /// Start a run on a worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or configuration is invalid.
    pub fn start<O>(&self, request: RunRequest, observer: O) -> Result<RunHandle, RunError>
    where
        O: RunObserver + Send + 'static,
    {
        start_run(self.shared_catalog(), request, self.config, observer)
    }

    /// Aggregate a completed run against this engine's catalog.
    #[must_use]
    pub fn report<F>(&self, run: &CompletedRun, skip: F) -> RollReport
    where
        F: Fn(&Item) -> bool,
    {
        aggregate(&self.catalog, run, skip)
    }
}
