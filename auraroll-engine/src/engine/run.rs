//! Stepwise execution of one run.
use std::sync::Arc;

use super::driver::Clock;
use super::plan::RollPlan;
use super::{
    CancelToken, CancelledRun, CompletedRun, RunError, RunOutcome, RunRequest, RunState, StateCell,
};
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::numbers::ratio;
use crate::rng::Sfc32;
use crate::tally::WinTally;

/// Result of advancing a run by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchStatus {
    /// More work may remain; carries the fraction of trials processed.
    Progress(f64),
    /// The run reached a terminal state.
    Finished,
}

/// A run in progress. Owns its plan, tally and random source.
#[derive(Debug)]
pub struct TrialRun {
    catalog: Arc<Catalog>,
    request: RunRequest,
    config: EngineConfig,
    plan: Option<RollPlan>,
    tally: WinTally,
    rng: Sfc32,
    cancel: CancelToken,
    status: StateCell,
}

impl TrialRun {
    /// Validate a request and stage it in the idle state.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or configuration is invalid, or if the
    /// context was resolved against a different catalog.
    pub fn new(
        catalog: Arc<Catalog>,
        request: RunRequest,
        config: EngineConfig,
    ) -> Result<Self, RunError> {
        request.validate()?;
        config.validate()?;
        if !request.context.fits(&catalog) {
            return Err(RunError::ForeignContext);
        }
        let rng = request
            .seed
            .map_or_else(Sfc32::from_os_entropy, Sfc32::from_user_seed);
        Ok(Self {
            tally: WinTally::new(catalog.len()),
            catalog,
            request,
            config,
            plan: None,
            rng,
            cancel: CancelToken::new(),
            status: StateCell::default(),
        })
    }

    /// Replace the cancellation flag with one the host already holds.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn state_cell(&self) -> StateCell {
        self.status.clone()
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.status.get()
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.tally.processed()
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.request.total
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        ratio(self.tally.processed(), self.request.total)
    }

    /// Advance the run by one batch.
    ///
    /// The first call compiles the plan. Later calls run up to
    /// `batch_max_trials` trials, stopping early once the time slice is
    /// spent. Cancellation is honoured before each batch.
    pub fn step<C: Clock + ?Sized>(&mut self, clock: &C) -> BatchStatus {
        match self.state() {
            RunState::Completed | RunState::Cancelled => return BatchStatus::Finished,
            RunState::Idle => {
                if self.cancel.is_cancelled() {
                    self.status.set(RunState::Cancelled);
                    return BatchStatus::Finished;
                }
                self.status.set(RunState::Compiling);
                self.plan = Some(RollPlan::compile(&self.catalog, &self.request.context));
                self.status.set(RunState::Running);
                log::info!(
                    "run started: {} trials at luck {}",
                    self.request.total,
                    self.request.luck()
                );
                return BatchStatus::Progress(0.0);
            }
            RunState::Compiling | RunState::Running => {}
        }
        if self.cancel.is_cancelled() {
            log::info!(
                "run cancelled after {} of {} trials",
                self.tally.processed(),
                self.request.total
            );
            self.status.set(RunState::Cancelled);
            return BatchStatus::Finished;
        }
        let Some(plan) = self.plan.as_ref() else {
            return BatchStatus::Finished;
        };

        let remaining = self.request.total - self.tally.processed();
        let limit = remaining.min(self.config.batch_max_trials);
        let interval = self.config.clock_check_interval;
        let slice = self.config.slice();
        let started = clock.now();
        let mut done = 0_u64;
        while done < limit {
            match plan.draw(&mut self.rng) {
                Some(item) => self.tally.record_win(item, plan.via_breakthrough(item)),
                None => self.tally.record_no_win(),
            }
            done += 1;
            if done % interval == 0 && clock.now().duration_since(started) >= slice {
                break;
            }
        }

        if self.tally.processed() >= self.request.total {
            self.status.set(RunState::Completed);
            log::info!(
                "run completed: {} trials, {} wins",
                self.request.total,
                self.tally.total_wins()
            );
        }
        BatchStatus::Progress(self.progress())
    }

    /// Consume a finished run.
    ///
    /// Runs that are not `Completed` are reported as cancelled.
    #[must_use]
    pub fn into_outcome(self) -> RunOutcome {
        let state = self.state();
        if state == RunState::Completed
            && let Some(plan) = self.plan
        {
            return RunOutcome::Completed(Box::new(CompletedRun {
                plan,
                tally: self.tally,
                context: self.request.context,
                total: self.request.total,
                seed: self.request.seed,
            }));
        }
        if state != RunState::Cancelled {
            self.status.set(RunState::Cancelled);
        }
        RunOutcome::Cancelled(CancelledRun {
            processed: self.tally.processed(),
            total: self.request.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::small_catalog;
    use crate::context::{Selection, resolve};
    use crate::engine::SystemClock;

    fn run(total: u64, config: EngineConfig) -> TrialRun {
        let catalog = Arc::new(small_catalog());
        let context = resolve(&catalog, &Selection::new("NORMAL", 2.0)).unwrap();
        TrialRun::new(
            catalog,
            RunRequest::new(total, 2.0, context).with_seed(5),
            config,
        )
        .unwrap()
    }

    #[test]
    fn first_step_compiles_then_batches_run() {
        let config = EngineConfig {
            batch_max_trials: 400,
            ..EngineConfig::default()
        };
        let mut trial = run(1_000, config);
        assert_eq!(trial.state(), RunState::Idle);
        assert_eq!(trial.step(&SystemClock), BatchStatus::Progress(0.0));
        assert_eq!(trial.state(), RunState::Running);
        assert_eq!(trial.step(&SystemClock), BatchStatus::Progress(0.4));
        assert_eq!(trial.step(&SystemClock), BatchStatus::Progress(0.8));
        assert_eq!(trial.step(&SystemClock), BatchStatus::Progress(1.0));
        assert_eq!(trial.state(), RunState::Completed);
        assert_eq!(trial.step(&SystemClock), BatchStatus::Finished);

        let outcome = trial.into_outcome();
        let completed = outcome.completed().unwrap();
        assert_eq!(completed.tally.processed(), 1_000);
        assert_eq!(
            completed.tally.total_wins() + completed.tally.no_win(),
            1_000
        );
    }

    #[test]
    fn cancellation_is_checked_before_each_batch() {
        let config = EngineConfig {
            batch_max_trials: 100,
            ..EngineConfig::default()
        };
        let mut trial = run(1_000, config);
        let token = trial.cancel_token();
        trial.step(&SystemClock);
        trial.step(&SystemClock);
        token.cancel();
        assert_eq!(trial.step(&SystemClock), BatchStatus::Finished);
        assert_eq!(trial.state(), RunState::Cancelled);
        match trial.into_outcome() {
            RunOutcome::Cancelled(cancelled) => {
                assert_eq!(cancelled.processed, 100);
                assert!(cancelled.processed < cancelled.total);
            }
            RunOutcome::Completed(_) => panic!("expected cancellation"),
        }
    }

    #[test]
    fn cancel_after_completion_changes_nothing() {
        let mut trial = run(10, EngineConfig::default());
        let token = trial.cancel_token();
        while trial.step(&SystemClock) != BatchStatus::Finished {}
        token.cancel();
        assert_eq!(trial.step(&SystemClock), BatchStatus::Finished);
        assert_eq!(trial.into_outcome().state(), RunState::Completed);
    }

    #[test]
    fn rejects_invalid_requests_synchronously() {
        let catalog = Arc::new(small_catalog());
        let context = resolve(&catalog, &Selection::new("NORMAL", 1.0)).unwrap();
        assert_eq!(
            TrialRun::new(
                Arc::clone(&catalog),
                RunRequest::new(0, 1.0, context.clone()),
                EngineConfig::default()
            )
            .err(),
            Some(RunError::ZeroTrials)
        );
        let bad_config = EngineConfig {
            slice_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            TrialRun::new(
                catalog,
                RunRequest::new(5, 1.0, context.clone()),
                bad_config,
            ),
            Err(RunError::Config(_))
        ));

        let tiny = Arc::new(
            Catalog::from_json(
                r#"{"default_context": "ONLY", "contexts": [{"id": "ONLY"}],
                    "items": [{"name": "A", "chance": 2}]}"#,
            )
            .unwrap(),
        );
        let foreign = resolve(&small_catalog(), &Selection::new("DREAMSPACE", 1.0)).unwrap();
        assert_eq!(
            TrialRun::new(
                tiny,
                RunRequest::new(5, 1.0, foreign),
                EngineConfig::default(),
            )
            .err(),
            Some(RunError::ForeignContext)
        );
    }
}
