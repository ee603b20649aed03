//! Per-test execution records.

use crate::result::{EngineError, EngineResult, Fault};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant, SystemTime};

/// One executed step, success or failure
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Wall-clock time the step started
    pub started_at: SystemTime,
    /// How long the step ran, pre/post hooks included
    pub duration: Duration,
    /// The fault, when the step failed
    pub fault: Option<Fault>,
}

impl StepRecord {
    /// Whether the step completed without a fault
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.fault.is_none()
    }
}

/// An error with no step record of its own.
///
/// Guard evaluation faults, empty-enabled-set stalls, and hook failures are
/// ledgered here so every error of a run stays visible, absorbed or not.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// Wall-clock time the failure was recorded
    pub at: SystemTime,
    /// Where the failure originated (hook name, "guards", "selection", ...)
    pub origin: String,
    /// Rendered error
    pub message: String,
    /// Whether the underlying fault was an assertion failure
    pub assertion: bool,
}

impl FailureRecord {
    pub(crate) fn from_error(origin: &str, error: &EngineError) -> Self {
        Self {
            at: SystemTime::now(),
            origin: origin.to_string(),
            message: error.to_string(),
            assertion: error.is_assertion(),
        }
    }
}

/// The record of one generated test case.
///
/// Created open, appended to while the test runs, sealed exactly once at
/// test end. `stopped` transitions false to true and never back.
#[derive(Debug, Clone, Serialize)]
pub struct TestCaseRecord {
    steps: Vec<StepRecord>,
    failures: Vec<FailureRecord>,
    started_at: SystemTime,
    #[serde(skip)]
    started_mono: Instant,
    ended_at: Option<SystemTime>,
    sealed_after: Option<Duration>,
    stopped: bool,
}

impl TestCaseRecord {
    pub(crate) fn new() -> Self {
        Self {
            steps: Vec::new(),
            failures: Vec::new(),
            started_at: SystemTime::now(),
            started_mono: Instant::now(),
            ended_at: None,
            sealed_after: None,
            stopped: false,
        }
    }

    /// Steps executed by this test, in execution order
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Errors recorded outside any step record
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Wall-clock start of the test
    #[must_use]
    pub const fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Wall-clock end of the test, once sealed
    #[must_use]
    pub const fn ended_at(&self) -> Option<SystemTime> {
        self.ended_at
    }

    /// Whether the record has been sealed
    #[must_use]
    pub const fn stopped(&self) -> bool {
        self.stopped
    }

    /// Number of executed steps
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Errors in this test: errored steps plus step-less failures
    #[must_use]
    pub fn error_count(&self) -> usize {
        let step_errors = self.steps.iter().filter(|s| s.fault.is_some()).count();
        step_errors + self.failures.len()
    }

    /// Elapsed time: live while the test runs, frozen once sealed
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.sealed_after
            .unwrap_or_else(|| self.started_mono.elapsed())
    }

    /// Distinct step names executed in this test
    #[must_use]
    pub fn unique_steps(&self) -> BTreeSet<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// How many times the named step ran in this test
    #[must_use]
    pub fn step_count_for(&self, name: &str) -> usize {
        self.steps.iter().filter(|s| s.name == name).count()
    }

    /// Whether the named step ran at least once in this test
    #[must_use]
    pub fn has_executed(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    pub(crate) fn append_step(&mut self, record: StepRecord) -> EngineResult<()> {
        if self.stopped {
            return Err(EngineError::invalid_state(
                "cannot append a step to a sealed test record",
            ));
        }
        self.steps.push(record);
        Ok(())
    }

    pub(crate) fn record_failure(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }

    /// Seal the record. Idempotent; the false-to-true transition happens once.
    pub(crate) fn seal(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.ended_at = Some(SystemTime::now());
        self.sealed_after = Some(self.started_mono.elapsed());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn step(name: &str, fault: Option<Fault>) -> StepRecord {
        StepRecord {
            name: name.to_string(),
            started_at: SystemTime::now(),
            duration: Duration::from_millis(1),
            fault,
        }
    }

    #[test]
    fn test_record_starts_open() {
        let record = TestCaseRecord::new();
        assert!(!record.stopped());
        assert_eq!(record.step_count(), 0);
        assert_eq!(record.error_count(), 0);
        assert!(record.ended_at().is_none());
    }

    #[test]
    fn test_append_and_count() {
        let mut record = TestCaseRecord::new();
        record.append_step(step("a", None)).unwrap();
        record.append_step(step("b", Some(Fault::error("x")))).unwrap();
        record.append_step(step("a", None)).unwrap();

        assert_eq!(record.step_count(), 3);
        assert_eq!(record.error_count(), 1);
        assert_eq!(record.step_count_for("a"), 2);
        assert_eq!(record.step_count_for("b"), 1);
        assert!(record.has_executed("b"));
        assert!(!record.has_executed("c"));
        assert_eq!(record.unique_steps().len(), 2);
    }

    #[test]
    fn test_seal_blocks_further_steps() {
        let mut record = TestCaseRecord::new();
        record.append_step(step("a", None)).unwrap();
        record.seal();
        assert!(record.stopped());
        assert!(record.ended_at().is_some());

        let err = record.append_step(step("b", None)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
        assert_eq!(record.step_count(), 1);
    }

    #[test]
    fn test_seal_is_idempotent() {
        let mut record = TestCaseRecord::new();
        record.seal();
        let first_end = record.ended_at();
        record.seal();
        assert_eq!(record.ended_at(), first_end);
    }

    #[test]
    fn test_duration_freezes_on_seal() {
        let mut record = TestCaseRecord::new();
        record.seal();
        let frozen = record.duration();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(record.duration(), frozen);
    }

    #[test]
    fn test_failures_count_toward_errors() {
        let mut record = TestCaseRecord::new();
        record.record_failure(FailureRecord::from_error(
            "guards",
            &EngineError::NoAvailableSteps { test: 1 },
        ));
        assert_eq!(record.error_count(), 1);
        assert_eq!(record.step_count(), 0);
        assert!(!record.failures()[0].assertion);
        assert_eq!(record.failures()[0].origin, "guards");
    }

    #[test]
    fn test_step_record_serializes() {
        let record = step("vend", Some(Fault::assertion("empty")));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"vend\""));
        assert!(json.contains("Assertion"));
    }
}
