//! The append-only execution ledger.
//!
//! The engine is the single writer; everything else reads. Records are never
//! mutated after sealing and never reordered, so the derived queries are
//! stable against a returned [`History`].

mod record;
mod stats;

pub use record::{FailureRecord, StepRecord, TestCaseRecord};
pub use stats::RunStatistics;

use crate::result::{EngineError, EngineResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant, SystemTime};

/// Ordered record of a whole generation run.
#[derive(Debug, Clone, Serialize, Default)]
pub struct History {
    tests: Vec<TestCaseRecord>,
    suite_failures: Vec<FailureRecord>,
    started_at: Option<SystemTime>,
    #[serde(skip)]
    started_mono: Option<Instant>,
    ended_at: Option<SystemTime>,
    total_duration: Option<Duration>,
}

impl History {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start the suite clock. Called once, at suite entry.
    pub(crate) fn begin(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(SystemTime::now());
            self.started_mono = Some(Instant::now());
        }
    }

    /// Stop the suite clock and seal any open test.
    pub(crate) fn finish(&mut self) {
        self.end_current_test();
        if self.total_duration.is_none() {
            self.ended_at = Some(SystemTime::now());
            self.total_duration = self.started_mono.map(|m| m.elapsed());
        }
    }

    /// Open a new test record. Fails when another test is still open.
    pub(crate) fn start_test(&mut self) -> EngineResult<()> {
        if self.current_test().is_some() {
            return Err(EngineError::invalid_state(
                "cannot start a test while another is open",
            ));
        }
        self.tests.push(TestCaseRecord::new());
        Ok(())
    }

    /// Seal the open test record. No-op when none is open.
    pub(crate) fn end_current_test(&mut self) {
        if let Some(test) = self.tests.last_mut() {
            test.seal();
        }
    }

    /// Append a step to the open test record.
    pub(crate) fn append_step(&mut self, record: StepRecord) -> EngineResult<()> {
        match self.current_test_mut() {
            Some(test) => test.append_step(record),
            None => Err(EngineError::invalid_state(
                "cannot append a step with no open test",
            )),
        }
    }

    /// Ledger an error against the open test, or the suite when none is open.
    pub(crate) fn record_failure(&mut self, failure: FailureRecord) {
        match self.current_test_mut() {
            Some(test) => test.record_failure(failure),
            None => self.suite_failures.push(failure),
        }
    }

    fn current_test_mut(&mut self) -> Option<&mut TestCaseRecord> {
        self.tests.last_mut().filter(|t| !t.stopped())
    }

    /// All test records, in generation order
    #[must_use]
    pub fn tests(&self) -> &[TestCaseRecord] {
        &self.tests
    }

    /// Errors ledgered outside any test (suite hook failures)
    #[must_use]
    pub fn suite_failures(&self) -> &[FailureRecord] {
        &self.suite_failures
    }

    /// Number of test records, the open one included
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Number of sealed test records
    #[must_use]
    pub fn completed_test_count(&self) -> usize {
        self.tests.iter().filter(|t| t.stopped()).count()
    }

    /// The open test record, when one exists
    #[must_use]
    pub fn current_test(&self) -> Option<&TestCaseRecord> {
        self.tests.last().filter(|t| !t.stopped())
    }

    /// Total executed steps across the whole run
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.tests.iter().map(TestCaseRecord::step_count).sum()
    }

    /// Execution count per step name, across the whole run
    #[must_use]
    pub fn step_frequency(&self) -> BTreeMap<String, usize> {
        let mut frequency = BTreeMap::new();
        for test in &self.tests {
            for step in test.steps() {
                *frequency.entry(step.name.clone()).or_insert(0) += 1;
            }
        }
        frequency
    }

    /// How many times the named step ran, across the whole run
    #[must_use]
    pub fn step_count(&self, name: &str) -> usize {
        self.tests.iter().map(|t| t.step_count_for(name)).sum()
    }

    /// Distinct step names executed at least once
    #[must_use]
    pub fn unique_steps_executed(&self) -> BTreeSet<String> {
        self.tests
            .iter()
            .flat_map(|t| t.steps().iter().map(|s| s.name.clone()))
            .collect()
    }

    /// Percentage of `catalogue` covered by executed steps, in `[0, 100]`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage_percentage(&self, catalogue: &[String]) -> f64 {
        if catalogue.is_empty() {
            return 0.0;
        }
        let executed = self.unique_steps_executed();
        let covered = catalogue.iter().filter(|n| executed.contains(*n)).count();
        covered as f64 / catalogue.len() as f64 * 100.0
    }

    /// Total errors: per-test errors plus suite-level failures
    #[must_use]
    pub fn error_count(&self) -> usize {
        let in_tests: usize = self.tests.iter().map(TestCaseRecord::error_count).sum();
        in_tests + self.suite_failures.len()
    }

    /// Wall-clock start of the run, once begun
    #[must_use]
    pub const fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// Elapsed run time: live while running, frozen once finished
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.total_duration.unwrap_or_else(|| {
            self.started_mono
                .map_or(Duration::ZERO, |mono| mono.elapsed())
        })
    }

    /// Aggregate statistics over the ledger
    #[must_use]
    pub fn statistics(&self) -> RunStatistics {
        RunStatistics::from_history(self)
    }

    /// Render the whole ledger as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Serialize`] when encoding fails.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
