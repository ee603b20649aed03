//! Aggregate statistics derived from the ledger.

use super::History;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Structured statistics for one generation run.
///
/// A stable, serializable aggregate for programmatic consumers; report
/// renderers consume this instead of re-walking the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    /// Test cases generated, open or sealed
    pub total_tests: usize,
    /// Steps executed across all tests
    pub total_steps: usize,
    /// Distinct step names executed
    pub unique_steps: usize,
    /// Errors across the run, absorbed ones included
    pub error_count: usize,
    /// Total run duration
    pub duration: Duration,
    /// Mean steps per test, zero when no tests ran
    pub average_steps_per_test: f64,
    /// Most frequently executed step, when any step ran
    pub most_executed_step: Option<String>,
    /// Least frequently executed step, when any step ran
    pub least_executed_step: Option<String>,
    /// Execution count per step name
    pub step_frequency: BTreeMap<String, usize>,
    /// Mean execution duration per step name
    pub mean_step_duration: BTreeMap<String, Duration>,
}

impl RunStatistics {
    /// Compute statistics from a history.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_history(history: &History) -> Self {
        let step_frequency = history.step_frequency();

        let mut total_durations: BTreeMap<String, (Duration, u32)> = BTreeMap::new();
        for test in history.tests() {
            for step in test.steps() {
                let entry = total_durations
                    .entry(step.name.clone())
                    .or_insert((Duration::ZERO, 0));
                entry.0 += step.duration;
                entry.1 += 1;
            }
        }
        let mean_step_duration = total_durations
            .into_iter()
            .map(|(name, (total, count))| (name, total / count.max(1)))
            .collect();

        let most_executed_step = step_frequency
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(name, _)| name.clone());
        let least_executed_step = step_frequency
            .iter()
            .min_by_key(|(_, count)| **count)
            .map(|(name, _)| name.clone());

        let total_tests = history.test_count();
        let total_steps = history.total_steps();
        let average_steps_per_test = if total_tests == 0 {
            0.0
        } else {
            total_steps as f64 / total_tests as f64
        };

        Self {
            total_tests,
            total_steps,
            unique_steps: history.unique_steps_executed().len(),
            error_count: history.error_count(),
            duration: history.duration(),
            average_steps_per_test,
            most_executed_step,
            least_executed_step,
            step_frequency,
            mean_step_duration,
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary:")?;
        writeln!(f, "  Tests: {}", self.total_tests)?;
        writeln!(f, "  Steps: {}", self.total_steps)?;
        writeln!(f, "  Unique steps: {}", self.unique_steps)?;
        writeln!(f, "  Errors: {}", self.error_count)?;
        writeln!(f, "  Duration: {:.3}s", self.duration.as_secs_f64())?;
        writeln!(
            f,
            "  Average steps per test: {:.2}",
            self.average_steps_per_test
        )?;
        if let Some(name) = &self.most_executed_step {
            writeln!(
                f,
                "  Most executed: {} ({} times)",
                name, self.step_frequency[name]
            )?;
        }
        if let Some(name) = &self.least_executed_step {
            writeln!(
                f,
                "  Least executed: {} ({} times)",
                name, self.step_frequency[name]
            )?;
        }
        Ok(())
    }
}
