//! The execution engine: a nested suite → test → step state machine.
//!
//! The engine owns the generate/execute loop. Each cycle it evaluates the
//! guards, hands the enabled set to the selection algorithm, invokes the
//! chosen step inside its hook bracket, ledgers the outcome, routes any
//! error through the two-level strategy cascade, and consults the end
//! conditions. Lifecycle hooks pair up even on error paths: every
//! `before_*` that ran gets its `after_*`, and cleanup failures are
//! captured without skipping the outer cleanups.

use crate::algorithm::Candidate;
use crate::config::EngineConfig;
use crate::error_strategy::Decision;
use crate::history::{FailureRecord, History, StepRecord};
use crate::model::{Hook, ModelSet, StepId};
use crate::result::{trap, EngineError, EngineResult, Fault};
use crate::rng::{Seed, TestRng};
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

/// Engine phase within the nested state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not running
    Idle,
    /// Between tests, inside the suite bracket
    Suite,
    /// Between steps, inside a test bracket
    Test,
    /// Executing one step cycle
    Step,
}

const fn allowed_transition(from: Phase, to: Phase) -> bool {
    matches!(
        (from, to),
        (Phase::Idle, Phase::Suite)
            | (Phase::Suite, Phase::Test)
            | (Phase::Test, Phase::Step)
            | (Phase::Step, Phase::Test)
            | (Phase::Step, Phase::Suite)
            | (Phase::Test, Phase::Suite)
            | (Phase::Suite, Phase::Idle)
    )
}

/// Outcome of a finished run: the sealed ledger plus the propagated error,
/// if one reached the caller.
#[derive(Debug)]
pub struct RunReport {
    /// The full execution ledger, every record sealed
    pub history: History,
    /// The error that propagated out of the suite, if any
    pub failure: Option<EngineError>,
}

impl RunReport {
    /// Whether the run finished without a propagated error
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Split into the ledger and a conventional result
    #[must_use]
    pub fn into_result(self) -> (History, EngineResult<()>) {
        let Self { history, failure } = self;
        match failure {
            Some(error) => (history, Err(error)),
            None => (history, Ok(())),
        }
    }
}

/// The generation engine.
///
/// Construction captures the model catalogue and configuration; [`run`]
/// consumes the engine and returns the ledger.
///
/// [`run`]: Engine::run
pub struct Engine {
    models: ModelSet,
    config: EngineConfig,
    catalogue: Vec<String>,
    seed: Seed,
    rng: TestRng,
    phase: Phase,
    history: History,
}

impl Engine {
    /// Build an engine over a model catalogue.
    ///
    /// A missing seed is derived from the wall clock here, so the value
    /// reported by [`Engine::seed`] always reproduces the run.
    #[must_use]
    pub fn new(models: ModelSet, config: EngineConfig) -> Self {
        let seed = config.seed.unwrap_or_else(Seed::from_time);
        let catalogue = models.step_names();
        info!(seed = seed.value(), steps = catalogue.len(), "engine ready");
        Self {
            models,
            config,
            catalogue,
            seed,
            rng: TestRng::new(seed),
            phase: Phase::Idle,
            history: History::new(),
        }
    }

    /// The seed this engine runs with
    #[must_use]
    pub const fn seed(&self) -> Seed {
        self.seed
    }

    /// The current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The catalogued step names, in supply order
    #[must_use]
    pub fn catalogue(&self) -> &[String] {
        &self.catalogue
    }

    /// Drive the whole suite and return the sealed ledger.
    #[must_use]
    pub fn run(mut self) -> RunReport {
        info!(seed = self.seed.value(), "generation run starting");
        self.history.begin();
        self.transition(Phase::Suite);

        let mut failure: Option<EngineError> = None;

        if let Err(error) = self.run_entry_hooks(Hook::BeforeSuite) {
            self.history
                .record_failure(FailureRecord::from_error(Hook::BeforeSuite.name(), &error));
            if self.suite_propagates(&error) {
                failure = Some(error);
            }
        }

        if failure.is_none() {
            failure = self.suite_loop();
        }

        // after_suite pairs with before_suite even on error paths
        if let Some(error) = self.run_cleanup_hooks(Hook::AfterSuite) {
            merge_failure(&mut failure, error);
        }

        self.transition(Phase::Idle);
        self.history.finish();
        match &failure {
            Some(error) => warn!(%error, "run propagated an error"),
            None => info!(
                tests = self.history.test_count(),
                steps = self.history.total_steps(),
                "run finished"
            ),
        }
        RunReport {
            history: self.history,
            failure,
        }
    }

    fn suite_loop(&mut self) -> Option<EngineError> {
        loop {
            if self
                .config
                .suite_end_condition
                .end_suite(&self.history, &self.catalogue)
            {
                debug!("suite end condition satisfied");
                return None;
            }

            if let Err(error) = self.history.start_test() {
                return Some(error);
            }
            debug!(test = self.history.test_count(), "test started");
            self.transition(Phase::Test);

            let mut held = self.run_test();

            // after_test pairs with before_test even when the test failed
            if let Some(error) = self.run_cleanup_hooks(Hook::AfterTest) {
                merge_failure(&mut held, error);
            }
            self.history.end_current_test();
            self.transition(Phase::Suite);

            if let Some(error) = held {
                if error.is_interrupt() {
                    return Some(error);
                }
                if self.config.stop_on_fail {
                    debug!("stop_on_fail set, ending suite");
                    return Some(error);
                }
                match self
                    .config
                    .suite_error_strategy
                    .on_suite_error(&error, &self.history)
                {
                    Decision::Propagate => return Some(error),
                    Decision::Absorb => {
                        warn!(%error, "suite strategy absorbed a test failure");
                    }
                }
            }
        }
    }

    /// One full test: the `before_test` bracket and the step loop.
    ///
    /// Returns the error the test propagates, if any. Every error is
    /// already ledgered when this returns.
    fn run_test(&mut self) -> Option<EngineError> {
        if let Err(error) = self.run_entry_hooks(Hook::BeforeTest) {
            self.history
                .record_failure(FailureRecord::from_error(Hook::BeforeTest.name(), &error));
            if error.is_interrupt() {
                return Some(error);
            }
            match self
                .config
                .test_error_strategy
                .on_test_error(&error, &self.history)
            {
                Decision::Propagate => return Some(error),
                Decision::Absorb => {
                    if self.cuts_test(&error) {
                        return None;
                    }
                }
            }
        }

        loop {
            if let Err(error) = self.step_cycle() {
                if error.is_interrupt() {
                    return Some(error);
                }
                match self
                    .config
                    .test_error_strategy
                    .on_test_error(&error, &self.history)
                {
                    Decision::Propagate => return Some(error),
                    Decision::Absorb => {
                        warn!(%error, "test strategy absorbed an error");
                        if self.cuts_test(&error) {
                            debug!("absorbed non-assertion error ends the test");
                            return None;
                        }
                    }
                }
            }

            if self
                .config
                .test_end_condition
                .end_test(&self.history, &self.catalogue)
            {
                debug!("test end condition satisfied");
                return None;
            }
        }
    }

    /// One step cycle: guards, selection, the hook bracket, the ledger
    /// append. Every error this returns is already ledgered.
    fn step_cycle(&mut self) -> EngineResult<()> {
        let candidates = match self.models.enabled_candidates(self.history.test_count()) {
            Ok(candidates) => candidates,
            Err(error) => {
                self.history
                    .record_failure(FailureRecord::from_error("guards", &error));
                return Err(error);
            }
        };
        if candidates.is_empty() {
            let error = EngineError::NoAvailableSteps {
                test: self.history.test_count(),
            };
            self.history
                .record_failure(FailureRecord::from_error("selection", &error));
            return Err(error);
        }

        self.transition(Phase::Step);
        let mut failure: Option<EngineError> = None;
        let mut executed: Option<(StepRecord, Option<EngineError>)> = None;

        match self.run_entry_hooks(Hook::Before) {
            Err(error) => {
                self.history
                    .record_failure(FailureRecord::from_error(Hook::Before.name(), &error));
                failure = Some(error);
            }
            Ok(()) => {
                let index = self
                    .config
                    .algorithm
                    .choose(&mut self.rng, &self.history, &candidates);
                let chosen: &Candidate = &candidates[index];
                debug!(step = %chosen.name, "step selected");
                executed = Some(self.execute_step(chosen.id, chosen.name.clone()));
            }
        }

        // `after` pairs with `before` even when the step or `before` failed
        let after_failure = self.run_cleanup_hooks(Hook::After);

        if let Some((record, step_error)) = executed {
            self.history.append_step(record)?;
            if let Some(error) = step_error {
                merge_failure(&mut failure, error);
            }
        }
        if let Some(error) = after_failure {
            merge_failure(&mut failure, error);
        }

        self.transition(Phase::Test);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Run the chosen step's guarded region: `pre_X`, the action, `post_X`.
    ///
    /// The region exits at the first fault; that fault is the step's
    /// outcome. The record is produced whether the step passed or not.
    fn execute_step(&self, id: StepId, name: String) -> (StepRecord, Option<EngineError>) {
        let started_at = SystemTime::now();
        let started = Instant::now();
        let step = self.models.step(id);

        let mut fault: Option<Fault> = None;
        if let Some(pre) = &step.pre {
            fault = run_user(pre).err();
        }
        if fault.is_none() {
            fault = run_user(&step.action).err();
        }
        if fault.is_none() {
            if let Some(post) = &step.post {
                fault = run_user(post).err();
            }
        }
        let duration = started.elapsed();

        let error = fault.clone().map(|fault| EngineError::StepFailed {
            test: self.history.test_count(),
            step: name.clone(),
            fault,
        });
        (
            StepRecord {
                name,
                started_at,
                duration,
                fault,
            },
            error,
        )
    }

    /// Invoke an entry hook on every model object, in supply order,
    /// stopping at the first failure.
    fn run_entry_hooks(&self, hook: Hook) -> EngineResult<()> {
        for object in self.models.objects() {
            if let Some(body) = object.hooks().get(hook) {
                run_user(body).map_err(|fault| EngineError::HookFailed {
                    hook: hook.name().to_string(),
                    fault,
                })?;
            }
        }
        Ok(())
    }

    /// Invoke a cleanup hook on every model object. Unlike entry hooks,
    /// every object's hook runs; failures are ledgered as they occur and
    /// the one to propagate is returned.
    fn run_cleanup_hooks(&mut self, hook: Hook) -> Option<EngineError> {
        let mut first: Option<EngineError> = None;
        for object in self.models.objects() {
            if let Some(body) = object.hooks().get(hook) {
                if let Err(fault) = run_user(body) {
                    let error = EngineError::HookFailed {
                        hook: hook.name().to_string(),
                        fault,
                    };
                    self.history
                        .record_failure(FailureRecord::from_error(hook.name(), &error));
                    merge_failure(&mut first, error);
                }
            }
        }
        first
    }

    /// Whether an absorbed error still ends the current test.
    fn cuts_test(&self, error: &EngineError) -> bool {
        self.config.stop_test_on_exception && !error.is_assertion() && !error.is_interrupt()
    }

    /// Suite-level decision for errors raised outside any test.
    fn suite_propagates(&self, error: &EngineError) -> bool {
        if error.is_interrupt() {
            return true;
        }
        matches!(
            self.config
                .suite_error_strategy
                .on_suite_error(error, &self.history),
            Decision::Propagate
        )
    }

    fn transition(&mut self, to: Phase) {
        debug_assert!(
            allowed_transition(self.phase, to),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            to
        );
        self.phase = to;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("seed", &self.seed)
            .field("phase", &self.phase)
            .field("catalogue", &self.catalogue)
            .finish_non_exhaustive()
    }
}

/// Invoke one user callable, trapping panics into faults.
fn run_user(f: &dyn Fn() -> Result<(), Fault>) -> Result<(), Fault> {
    trap(f).and_then(std::convert::identity)
}

/// Keep the first failure; an interrupt replaces a non-interrupt holder so
/// cancellation is never absorbed. Dropped errors are already ledgered.
fn merge_failure(slot: &mut Option<EngineError>, error: EngineError) {
    let replaces = match slot.as_ref() {
        None => true,
        Some(held) => !held.is_interrupt() && error.is_interrupt(),
    };
    if replaces {
        *slot = Some(error);
    } else {
        warn!(%error, "secondary failure kept in ledger only");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::end_condition::Length;
    use crate::error_strategy::{AllowCount, AlwaysIgnore};
    use crate::model::{ModelBuilder, StepDef};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Trace = Rc<RefCell<Vec<String>>>;

    fn tracing_model(trace: &Trace) -> ModelSet {
        let mut builder = ModelBuilder::new("traced");
        for hook in ["before_suite", "after_suite", "before_test", "after_test", "before", "after"]
        {
            let log = Rc::clone(trace);
            let name = hook.to_string();
            builder = builder.function(hook, move || {
                log.borrow_mut().push(name.clone());
                Ok(())
            });
        }
        let log = Rc::clone(trace);
        builder = builder.step(StepDef::new("work", move || {
            log.borrow_mut().push("work".to_string());
            Ok(())
        }));
        ModelSet::single(builder.build().unwrap()).unwrap()
    }

    fn single_step_model(action: impl Fn() -> Result<(), Fault> + 'static) -> ModelSet {
        ModelSet::single(
            ModelBuilder::new("m")
                .step(StepDef::new("s", action))
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    fn config(steps: usize, tests: usize) -> crate::config::EngineConfigBuilder {
        EngineConfig::builder()
            .seed(333u64)
            .test_end_condition(Length::new(steps).unwrap())
            .suite_end_condition(Length::new(tests).unwrap())
    }

    #[test]
    fn test_length_by_length_round_trip() {
        let report = Engine::new(single_step_model(|| Ok(())), config(5, 3).build()).run();

        assert!(report.passed());
        assert_eq!(report.history.test_count(), 3);
        for test in report.history.tests() {
            assert_eq!(test.step_count(), 5);
            assert!(test.stopped());
            assert_eq!(test.error_count(), 0);
        }
        assert_eq!(report.history.total_steps(), 15);
    }

    #[test]
    fn test_hook_trace_orders_correctly() {
        let trace: Trace = Rc::default();
        let models = tracing_model(&trace);
        let report = Engine::new(models, config(2, 1).build()).run();
        assert!(report.passed());

        let observed = trace.borrow().clone();
        assert_eq!(
            observed,
            vec![
                "before_suite",
                "before_test",
                "before",
                "work",
                "after",
                "before",
                "work",
                "after",
                "after_test",
                "after_suite",
            ]
        );
    }

    #[test]
    fn test_determinism_same_seed_same_history() {
        let model = || {
            ModelSet::single(
                ModelBuilder::new("m")
                    .step(StepDef::new("a", || Ok(())))
                    .step(StepDef::new("b", || Ok(())))
                    .step(StepDef::new("c", || Ok(())))
                    .build()
                    .unwrap(),
            )
            .unwrap()
        };
        let sequence = |seed: u64| -> Vec<String> {
            let report = Engine::new(
                model(),
                EngineConfig::builder()
                    .seed(seed)
                    .test_end_condition(Length::new(20).unwrap())
                    .suite_end_condition(Length::new(2).unwrap())
                    .build(),
            )
            .run();
            report
                .history
                .tests()
                .iter()
                .flat_map(|t| t.steps().iter().map(|s| s.name.clone()))
                .collect()
        };

        assert_eq!(sequence(42), sequence(42));
        assert_ne!(sequence(42), sequence(43));
    }

    #[test]
    fn test_no_available_steps_propagates_with_empty_ledger() {
        let models = ModelSet::single(
            ModelBuilder::new("m")
                .step(StepDef::new("never", || Ok(())).enabled(false))
                .build()
                .unwrap(),
        )
        .unwrap();
        let report = Engine::new(models, config(5, 1).build()).run();

        let failure = report.failure.unwrap();
        assert!(matches!(failure, EngineError::NoAvailableSteps { test: 1 }));
        assert_eq!(report.history.total_steps(), 0);
        // The stall itself is ledgered
        assert_eq!(report.history.error_count(), 1);
    }

    #[test]
    fn test_allow_count_absorbs_then_propagates() {
        let models = single_step_model(|| Err(Fault::assertion("always failing")));
        let report = Engine::new(
            models,
            config(10, 1)
                .test_error_strategy(AllowCount::new(2))
                .build(),
        )
        .run();

        let failure = report.failure.expect("third error should propagate");
        assert!(failure.is_assertion());
        assert_eq!(report.history.test_count(), 1);
        let test = &report.history.tests()[0];
        assert_eq!(test.step_count(), 3);
        assert!(test.steps().iter().all(|s| !s.passed()));
        assert_eq!(test.error_count(), 3);
    }

    #[test]
    fn test_stop_test_on_exception_cuts_but_suite_continues() {
        let models = single_step_model(|| Err(Fault::error("flaky io")));
        let report = Engine::new(
            models,
            config(10, 3)
                .test_error_strategy(AlwaysIgnore)
                .stop_test_on_exception(true)
                .build(),
        )
        .run();

        // Every test ends after its first absorbed non-assertion error
        assert!(report.passed());
        assert_eq!(report.history.test_count(), 3);
        for test in report.history.tests() {
            assert_eq!(test.step_count(), 1);
        }
    }

    #[test]
    fn test_absorbed_assertions_do_not_cut_the_test() {
        let models = single_step_model(|| Err(Fault::assertion("soft check")));
        let report = Engine::new(
            models,
            config(4, 1)
                .test_error_strategy(AlwaysIgnore)
                .stop_test_on_exception(true)
                .build(),
        )
        .run();

        assert!(report.passed());
        assert_eq!(report.history.tests()[0].step_count(), 4);
        assert_eq!(report.history.tests()[0].error_count(), 4);
    }

    #[test]
    fn test_interrupt_is_never_absorbed() {
        let models = single_step_model(|| Err(Fault::interrupt("stop requested")));
        let report = Engine::new(
            models,
            config(10, 5)
                .test_error_strategy(AlwaysIgnore)
                .suite_error_strategy(AlwaysIgnore)
                .stop_on_fail(false)
                .build(),
        )
        .run();

        let failure = report.failure.expect("interrupt must propagate");
        assert!(failure.is_interrupt());
        assert_eq!(report.history.test_count(), 1);
    }

    #[test]
    fn test_cleanup_hooks_run_on_interrupt() {
        let trace: Trace = Rc::default();
        let log = Rc::clone(&trace);
        let models = ModelSet::single(
            ModelBuilder::new("m")
                .step(StepDef::new("s", || Err(Fault::interrupt("now"))))
                .function("after", {
                    let log = Rc::clone(&trace);
                    move || {
                        log.borrow_mut().push("after".to_string());
                        Ok(())
                    }
                })
                .function("after_test", {
                    let log = Rc::clone(&trace);
                    move || {
                        log.borrow_mut().push("after_test".to_string());
                        Ok(())
                    }
                })
                .function("after_suite", move || {
                    log.borrow_mut().push("after_suite".to_string());
                    Ok(())
                })
                .build()
                .unwrap(),
        )
        .unwrap();

        let report = Engine::new(models, config(5, 1).build()).run();
        assert!(report.failure.unwrap().is_interrupt());
        assert_eq!(
            trace.borrow().clone(),
            vec!["after", "after_test", "after_suite"]
        );
    }

    #[test]
    fn test_panicking_step_is_captured_and_cascaded() {
        let models = single_step_model(|| panic!("unexpected"));
        let report = Engine::new(models, config(3, 1).build()).run();

        let failure = report.failure.unwrap();
        assert!(matches!(failure, EngineError::StepFailed { .. }));
        assert!(!failure.is_assertion());
        assert_eq!(report.history.tests()[0].step_count(), 1);
    }

    #[test]
    fn test_after_test_failure_reaches_the_caller() {
        let models = ModelSet::single(
            ModelBuilder::new("m")
                .step(StepDef::new("s", || Ok(())))
                .function("after_test", || Err(Fault::error("teardown broke")))
                .build()
                .unwrap(),
        )
        .unwrap();
        let report = Engine::new(models, config(2, 1).build()).run();

        let failure = report.failure.unwrap();
        assert!(matches!(failure, EngineError::HookFailed { .. }));
        // Record still sealed despite the teardown failure
        assert!(report.history.tests()[0].stopped());
    }

    #[test]
    fn test_pre_failure_skips_action_and_post() {
        let trace: Trace = Rc::default();
        let models = ModelSet::single(
            ModelBuilder::new("m")
                .step(StepDef::new("s", {
                    let log = Rc::clone(&trace);
                    move || {
                        log.borrow_mut().push("action".to_string());
                        Ok(())
                    }
                }))
                .function("pre_s", || Err(Fault::error("setup failed")))
                .function("post_s", {
                    let log = Rc::clone(&trace);
                    move || {
                        log.borrow_mut().push("post".to_string());
                        Ok(())
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();

        let report = Engine::new(models, config(3, 1).build()).run();
        assert!(report.failure.is_some());
        assert!(trace.borrow().is_empty(), "region must exit at the pre fault");
        // The step record carries the pre fault as the step outcome
        assert_eq!(report.history.tests()[0].step_count(), 1);
        assert!(!report.history.tests()[0].steps()[0].passed());
    }

    #[test]
    fn test_phase_returns_to_idle() {
        let engine = Engine::new(single_step_model(|| Ok(())), config(1, 1).build());
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.catalogue(), &["s".to_string()]);
        let report = engine.run();
        assert!(report.passed());
    }

    #[test]
    fn test_into_result_splits_outcome() {
        let report = Engine::new(single_step_model(|| Ok(())), config(1, 1).build()).run();
        let (history, outcome) = report.into_result();
        assert!(outcome.is_ok());
        assert_eq!(history.total_steps(), 1);
    }
}
