//! Monte-Carlo trial engine.
//!
//! A run compiles a [`RollPlan`] once, then executes trials in bounded
//! batches so the host can interleave rendering, input and cancellation.
//! Every trial is independent; order of execution never changes results for
//! a given seed.

mod driver;
mod plan;
mod run;
mod table;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use thiserror::Error;

use crate::config::ConfigError;
use crate::context::{EvaluationContext, SelectionError};
use crate::numbers::ratio;
use crate::tally::WinTally;

pub use driver::{
    Clock, NoYield, RunCallbacks, RunHandle, RunObserver, Scheduler, SystemClock, ThreadYield,
    drive, start_run,
};
#[cfg(feature = "async")]
pub use driver::drive_async;
pub use plan::{Lane, OutcomeDistribution, PlannedItem, RollPlan};
pub use run::{BatchStatus, TrialRun};
pub use table::{TableEntry, WeightedTable, sequential_weights};

/// Errors rejected synchronously when a run is requested.
#[derive(Debug, Error, PartialEq)]
pub enum RunError {
    #[error("a run needs at least one trial")]
    ZeroTrials,
    #[error("luck must be a finite value >= 0 (got {0})")]
    InvalidLuck(f64),
    #[error("evaluation context references ids outside this catalog")]
    ForeignContext,
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start run worker: {0}")]
    Spawn(String),
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Compiling,
    Running,
    Completed,
    Cancelled,
}

impl RunState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    const fn to_raw(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Compiling => 1,
            Self::Running => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Compiling,
            2 => Self::Running,
            3 => Self::Completed,
            4 => Self::Cancelled,
            _ => Self::Idle,
        }
    }
}

/// Shared view of a run's state, readable from any thread.
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    #[must_use]
    pub fn get(&self) -> RunState {
        RunState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: RunState) {
        self.0.store(state.to_raw(), Ordering::Release);
    }
}

/// Cooperative cancellation flag, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What the host asks for: how many trials, against which context.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub total: u64,
    pub context: EvaluationContext,
    /// Fixed seed for reproducible runs; OS entropy otherwise.
    pub seed: Option<u64>,
}

impl RunRequest {
    /// Request `total` trials at `luck`.
    #[must_use]
    pub fn new(total: u64, luck: f64, context: EvaluationContext) -> Self {
        Self {
            total,
            context: context.with_luck(luck),
            seed: None,
        }
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn luck(&self) -> f64 {
        self.context.luck()
    }

    /// # Errors
    ///
    /// Returns an error for zero trials or invalid luck.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.total == 0 {
            return Err(RunError::ZeroTrials);
        }
        let luck = self.context.luck();
        if !luck.is_finite() || luck < 0.0 {
            return Err(RunError::InvalidLuck(luck));
        }
        Ok(())
    }
}

/// A run that processed every requested trial.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub plan: RollPlan,
    pub tally: WinTally,
    pub context: EvaluationContext,
    pub total: u64,
    pub seed: Option<u64>,
}

impl CompletedRun {
    #[must_use]
    pub const fn luck(&self) -> f64 {
        self.context.luck()
    }
}

/// A run stopped early; partial counts are not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledRun {
    pub processed: u64,
    pub total: u64,
}

impl CancelledRun {
    #[must_use]
    pub fn fraction(&self) -> f64 {
        ratio(self.processed, self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Box<CompletedRun>),
    Cancelled(CancelledRun),
}

impl RunOutcome {
    #[must_use]
    pub const fn state(&self) -> RunState {
        match self {
            Self::Completed(_) => RunState::Completed,
            Self::Cancelled(_) => RunState::Cancelled,
        }
    }

    #[must_use]
    pub fn completed(&self) -> Option<&CompletedRun> {
        match self {
            Self::Completed(run) => Some(run),
            Self::Cancelled(_) => None,
        }
    }

    #[must_use]
    pub fn into_completed(self) -> Option<CompletedRun> {
        match self {
            Self::Completed(run) => Some(*run),
            Self::Cancelled(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::small_catalog;
    use crate::context::{Selection, resolve};

    #[test]
    fn state_round_trips_through_the_cell() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), RunState::Idle);
        for state in [
            RunState::Compiling,
            RunState::Running,
            RunState::Completed,
            RunState::Cancelled,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
        assert!(RunState::Cancelled.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn request_stamps_luck_and_validates() {
        let catalog = small_catalog();
        let context = resolve(&catalog, &Selection::new("NORMAL", 1.0)).unwrap();
        let request = RunRequest::new(10, 7.5, context.clone());
        assert!((request.luck() - 7.5).abs() < f64::EPSILON);
        assert!(request.validate().is_ok());
        assert_eq!(
            RunRequest::new(0, 1.0, context.clone()).validate(),
            Err(RunError::ZeroTrials)
        );
        assert!(matches!(
            RunRequest::new(5, f64::INFINITY, context).validate(),
            Err(RunError::InvalidLuck(_))
        ));
    }

    #[test]
    fn cancelled_fraction_reports_progress() {
        let cancelled = CancelledRun {
            processed: 25,
            total: 100,
        };
        assert!((cancelled.fraction() - 0.25).abs() < f64::EPSILON);
    }
}
