//! Host-facing drivers: clock and scheduler seams, observers, and the
//! threaded run handle.
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use super::run::{BatchStatus, TrialRun};
use super::{CancelToken, RunError, RunOutcome, RunRequest, RunState, StateCell};
use crate::catalog::Catalog;
use crate::config::EngineConfig;

/// Monotonic time source consulted inside batches.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Gives the host a chance to run between batches.
pub trait Scheduler {
    fn yield_now(&mut self);
}

/// Yields the OS thread between batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadYield;

impl Scheduler for ThreadYield {
    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Runs batches back to back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoYield;

impl Scheduler for NoYield {
    fn yield_now(&mut self) {}
}

/// Receives progress and the final outcome of a run.
pub trait RunObserver {
    fn on_progress(&mut self, _fraction: f64) {}
    fn on_complete(&mut self, _outcome: &RunOutcome) {}
}

impl RunObserver for () {}

type ProgressFn = Box<dyn FnMut(f64) + Send>;
type CompleteFn = Box<dyn FnMut(&RunOutcome) + Send>;

/// Closure-backed observer.
#[derive(Default)]
pub struct RunCallbacks {
    progress: Option<ProgressFn>,
    complete: Option<CompleteFn>,
}

impl RunCallbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_progress(mut self, callback: impl FnMut(f64) + Send + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, callback: impl FnMut(&RunOutcome) + Send + 'static) -> Self {
        self.complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for RunCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCallbacks")
            .field("progress", &self.progress.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

impl RunObserver for RunCallbacks {
    fn on_progress(&mut self, fraction: f64) {
        if let Some(callback) = self.progress.as_mut() {
            callback(fraction);
        }
    }

    fn on_complete(&mut self, outcome: &RunOutcome) {
        if let Some(callback) = self.complete.as_mut() {
            callback(outcome);
        }
    }
}

/// Drive `run` to a terminal state on the current thread.
pub fn drive<S, C, O>(
    mut run: TrialRun,
    scheduler: &mut S,
    clock: &C,
    observer: &mut O,
) -> RunOutcome
where
    S: Scheduler + ?Sized,
    C: Clock + ?Sized,
    O: RunObserver + ?Sized,
{
    while let BatchStatus::Progress(fraction) = run.step(clock) {
        observer.on_progress(fraction);
        scheduler.yield_now();
    }
    let outcome = run.into_outcome();
    observer.on_complete(&outcome);
    outcome
}

/// Drive `run` inside an async runtime, yielding to the executor between
/// batches.
#[cfg(feature = "async")]
pub async fn drive_async<C, O>(mut run: TrialRun, clock: &C, observer: &mut O) -> RunOutcome
where
    C: Clock + ?Sized,
    O: RunObserver + ?Sized,
{
    while let BatchStatus::Progress(fraction) = run.step(clock) {
        observer.on_progress(fraction);
        tokio::task::yield_now().await;
    }
    let outcome = run.into_outcome();
    observer.on_complete(&outcome);
    outcome
}

/// Handle to a run executing on a worker thread.
#[derive(Debug)]
pub struct RunHandle {
    cancel: CancelToken,
    status: StateCell,
    worker: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Request cancellation; a no-op once the run has finished.
    pub fn cancel(&self) {
        if !self.status.get().is_terminal() {
            self.cancel.cancel();
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.status.get()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and take its outcome.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the worker thread.
    #[must_use]
    pub fn join(self) -> RunOutcome {
        match self.worker.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Validate a request and start it on a worker thread.
///
/// Invalid requests are rejected here, before any thread is spawned.
///
/// # Errors
///
/// Returns `RunError` for zero trials, bad luck, invalid configuration or a
/// context resolved against another catalog.
pub fn start_run<O>(
    catalog: Arc<Catalog>,
    request: RunRequest,
    config: EngineConfig,
    mut observer: O,
) -> Result<RunHandle, RunError>
where
    O: RunObserver + Send + 'static,
{
    let run = TrialRun::new(catalog, request, config)?;
    let cancel = run.cancel_token();
    let status = run.state_cell();
    let worker = std::thread::Builder::new()
        .name("auraroll-run".to_string())
        .spawn(move || drive(run, &mut ThreadYield, &SystemClock, &mut observer));
    let worker = match worker {
        Ok(worker) => worker,
        Err(err) => {
            log::error!("failed to spawn run worker: {err}");
            return Err(RunError::Spawn(err.to_string()));
        }
    };
    Ok(RunHandle {
        cancel,
        status,
        worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::small_catalog;
    use crate::config::EngineConfig;
    use crate::context::{Selection, resolve};
    use std::cell::Cell;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Clock that advances a fixed step on every read.
    struct SteppingClock {
        base: Instant,
        reads: Cell<u32>,
        step: Duration,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Instant {
            let reads = self.reads.get();
            self.reads.set(reads + 1);
            self.base + self.step * reads
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Vec<f64>,
        completions: usize,
    }

    impl RunObserver for Recorder {
        fn on_progress(&mut self, fraction: f64) {
            self.progress.push(fraction);
        }

        fn on_complete(&mut self, _outcome: &RunOutcome) {
            self.completions += 1;
        }
    }

    fn trial(total: u64, config: EngineConfig) -> TrialRun {
        let catalog = Arc::new(small_catalog());
        let context = resolve(&catalog, &Selection::new("NORMAL", 1.0)).unwrap();
        TrialRun::new(
            catalog,
            RunRequest::new(total, 1.0, context).with_seed(11),
            config,
        )
        .unwrap()
    }

    #[test]
    fn drive_reports_monotone_progress_and_completes_once() {
        let config = EngineConfig {
            batch_max_trials: 1_000,
            ..EngineConfig::default()
        };
        let mut recorder = Recorder::default();
        let outcome = drive(
            trial(10_000, config),
            &mut NoYield,
            &SystemClock,
            &mut recorder,
        );
        assert_eq!(outcome.state(), RunState::Completed);
        assert_eq!(recorder.completions, 1);
        assert!(recorder.progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(recorder.progress.last().copied(), Some(1.0));
    }

    #[test]
    fn slow_clock_cuts_batches_short() {
        let config = EngineConfig {
            batch_max_trials: 10_000,
            slice_ms: 16,
            clock_check_interval: 100,
        };
        let clock = SteppingClock {
            base: Instant::now(),
            reads: Cell::new(0),
            step: Duration::from_millis(20),
        };
        let mut run = trial(10_000, config);
        run.step(&clock);
        assert_eq!(run.step(&clock), BatchStatus::Progress(0.01));
    }

    #[test]
    fn handle_runs_to_completion_on_a_thread() {
        let catalog = Arc::new(small_catalog());
        let context = resolve(&catalog, &Selection::new("NORMAL", 1.0)).unwrap();
        let completed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&completed);
        let callbacks = RunCallbacks::new().on_complete(move |outcome: &RunOutcome| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(outcome.state());
            }
        });
        let handle = start_run(
            catalog,
            RunRequest::new(5_000, 1.0, context).with_seed(3),
            EngineConfig::default(),
            callbacks,
        )
        .unwrap();
        let outcome = handle.join();
        assert_eq!(outcome.state(), RunState::Completed);
        assert_eq!(*completed.lock().unwrap(), Some(RunState::Completed));
    }

    #[test]
    fn start_run_rejects_before_spawning() {
        let catalog = Arc::new(small_catalog());
        let context = resolve(&catalog, &Selection::new("NORMAL", 1.0)).unwrap();
        assert_eq!(
            start_run(
                catalog,
                RunRequest::new(0, 1.0, context),
                EngineConfig::default(),
                (),
            )
            .err(),
            Some(RunError::ZeroTrials)
        );
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_driver_matches_sync_driver() {
        let config = EngineConfig {
            batch_max_trials: 2_000,
            ..EngineConfig::default()
        };
        let sync = drive(trial(20_000, config), &mut NoYield, &SystemClock, &mut ());
        let async_outcome = drive_async(trial(20_000, config), &SystemClock, &mut ()).await;
        assert_eq!(sync, async_outcome);
    }
}
