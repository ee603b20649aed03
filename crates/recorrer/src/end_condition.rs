//! Composable end conditions.
//!
//! A condition exposes two independent predicates over the history: one
//! deciding when the current test is done, one deciding when the whole
//! suite is done. Conditions are evaluated after the step or test they
//! gate on: a test ends after the step that first satisfies the test
//! predicate, a suite after the test that first satisfies the suite
//! predicate.

use crate::history::History;
use crate::result::{EngineError, EngineResult};
use std::fmt;
use std::time::Duration;

/// Predicate pair consulted by the engine after every step and test.
pub trait EndCondition {
    /// Whether the current test should end
    fn end_test(&self, history: &History, catalogue: &[String]) -> bool;

    /// Whether the suite should end
    fn end_suite(&self, history: &History, catalogue: &[String]) -> bool;
}

/// Stop after a fixed number of steps (test) or sealed tests (suite).
#[derive(Debug, Clone, Copy)]
pub struct Length {
    count: usize,
}

impl Length {
    /// Stop a test at `count` steps; stop a suite at `count` tests.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] when `count` is zero.
    pub fn new(count: usize) -> EngineResult<Self> {
        if count == 0 {
            return Err(EngineError::configuration(
                "Length requires a strictly positive count",
            ));
        }
        Ok(Self { count })
    }

    /// Infallible constructor for known-good defaults.
    pub(crate) const fn of(count: usize) -> Self {
        Self { count }
    }
}

impl EndCondition for Length {
    fn end_test(&self, history: &History, _catalogue: &[String]) -> bool {
        history
            .current_test()
            .is_some_and(|test| test.step_count() >= self.count)
    }

    fn end_suite(&self, history: &History, _catalogue: &[String]) -> bool {
        history.completed_test_count() >= self.count
    }
}

/// Stop once wall-clock time runs out.
///
/// Does not preempt a running step; the loop stops at the next evaluation
/// point after the limit passes. The suite clock starts at suite entry,
/// immediately before the first `before_suite` hook.
#[derive(Debug, Clone, Copy)]
pub struct Time {
    limit: Duration,
}

impl Time {
    /// Stop a test (or suite) once its elapsed time reaches `limit`
    #[must_use]
    pub const fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl EndCondition for Time {
    fn end_test(&self, history: &History, _catalogue: &[String]) -> bool {
        history
            .current_test()
            .is_some_and(|test| test.duration() >= self.limit)
    }

    fn end_suite(&self, history: &History, _catalogue: &[String]) -> bool {
        history.duration() >= self.limit
    }
}

/// Stop once enough of the catalogue has been executed.
#[derive(Debug, Clone, Copy)]
pub struct StepCoverage {
    percentage: f64,
}

impl StepCoverage {
    /// Stop once coverage reaches `percentage` of the catalogue.
    ///
    /// The test predicate counts the current test's unique steps; the suite
    /// predicate counts unique steps across the whole run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] unless `percentage` is in
    /// `[1, 100]`.
    pub fn new(percentage: f64) -> EngineResult<Self> {
        if !percentage.is_finite() || !(1.0..=100.0).contains(&percentage) {
            return Err(EngineError::configuration(format!(
                "StepCoverage requires a percentage in [1, 100], got {percentage}"
            )));
        }
        Ok(Self { percentage })
    }
}

impl EndCondition for StepCoverage {
    #[allow(clippy::cast_precision_loss)]
    fn end_test(&self, history: &History, catalogue: &[String]) -> bool {
        if catalogue.is_empty() {
            return false;
        }
        let Some(test) = history.current_test() else {
            return false;
        };
        let covered = catalogue.iter().filter(|n| test.has_executed(n)).count();
        covered as f64 / catalogue.len() as f64 * 100.0 >= self.percentage
    }

    fn end_suite(&self, history: &History, catalogue: &[String]) -> bool {
        if catalogue.is_empty() {
            return false;
        }
        history.coverage_percentage(catalogue) >= self.percentage
    }
}

/// Never stop. Open-ended online runs only; interrupt to leave.
#[derive(Debug, Clone, Copy, Default)]
pub struct Endless;

impl EndCondition for Endless {
    fn end_test(&self, _history: &History, _catalogue: &[String]) -> bool {
        false
    }

    fn end_suite(&self, _history: &History, _catalogue: &[String]) -> bool {
        false
    }
}

/// Conjunction: fires only when every sub-condition fires.
pub struct And {
    conditions: Vec<Box<dyn EndCondition>>,
}

impl And {
    /// Combine two or more conditions conjunctively.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] with fewer than two
    /// sub-conditions.
    pub fn new(conditions: Vec<Box<dyn EndCondition>>) -> EngineResult<Self> {
        if conditions.len() < 2 {
            return Err(EngineError::configuration(
                "And requires at least two end conditions",
            ));
        }
        Ok(Self { conditions })
    }
}

impl EndCondition for And {
    fn end_test(&self, history: &History, catalogue: &[String]) -> bool {
        self.conditions.iter().all(|c| c.end_test(history, catalogue))
    }

    fn end_suite(&self, history: &History, catalogue: &[String]) -> bool {
        self.conditions
            .iter()
            .all(|c| c.end_suite(history, catalogue))
    }
}

impl fmt::Debug for And {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("And")
            .field("conditions", &self.conditions.len())
            .finish()
    }
}

/// Disjunction: fires when any sub-condition fires.
pub struct Or {
    conditions: Vec<Box<dyn EndCondition>>,
}

impl Or {
    /// Combine two or more conditions disjunctively.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] with fewer than two
    /// sub-conditions.
    pub fn new(conditions: Vec<Box<dyn EndCondition>>) -> EngineResult<Self> {
        if conditions.len() < 2 {
            return Err(EngineError::configuration(
                "Or requires at least two end conditions",
            ));
        }
        Ok(Self { conditions })
    }
}

impl EndCondition for Or {
    fn end_test(&self, history: &History, catalogue: &[String]) -> bool {
        self.conditions.iter().any(|c| c.end_test(history, catalogue))
    }

    fn end_suite(&self, history: &History, catalogue: &[String]) -> bool {
        self.conditions
            .iter()
            .any(|c| c.end_suite(history, catalogue))
    }
}

impl fmt::Debug for Or {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Or")
            .field("conditions", &self.conditions.len())
            .finish()
    }
}
