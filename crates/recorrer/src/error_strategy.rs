//! Two-level error strategies.
//!
//! Every in-run error is ledgered, then handed to the test-level strategy;
//! only a test-level propagation reaches the suite-level strategy. The
//! cascade is an explicit decision value, not control flow: strategies
//! return [`Decision`] and the engine branches on it. Interrupts never
//! reach a strategy; the engine propagates them unconditionally.

use crate::history::History;
use crate::result::EngineError;

/// What to do with an error that just occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Re-raise: break out of the current scope with the error held
    Propagate,
    /// Swallow: count the error and keep generating
    Absorb,
}

/// Policy deciding whether an error halts or is absorbed.
///
/// The engine ledgers the error *before* consulting the strategy, so the
/// history a strategy observes already includes the error under decision.
pub trait ErrorStrategy {
    /// Decide at the test level
    fn on_test_error(&self, error: &EngineError, history: &History) -> Decision;

    /// Decide at the suite level; only reached when the test level propagated
    fn on_suite_error(&self, error: &EngineError, history: &History) -> Decision;
}

/// Propagate every error.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRaise;

impl ErrorStrategy for AlwaysRaise {
    fn on_test_error(&self, _error: &EngineError, _history: &History) -> Decision {
        Decision::Propagate
    }

    fn on_suite_error(&self, _error: &EngineError, _history: &History) -> Decision {
        Decision::Propagate
    }
}

/// Absorb every error.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysIgnore;

impl ErrorStrategy for AlwaysIgnore {
    fn on_test_error(&self, _error: &EngineError, _history: &History) -> Decision {
        Decision::Absorb
    }

    fn on_suite_error(&self, _error: &EngineError, _history: &History) -> Decision {
        Decision::Absorb
    }
}

/// Absorb assertion failures, propagate everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreAssertions;

impl ErrorStrategy for IgnoreAssertions {
    fn on_test_error(&self, error: &EngineError, _history: &History) -> Decision {
        if error.is_assertion() {
            Decision::Absorb
        } else {
            Decision::Propagate
        }
    }

    fn on_suite_error(&self, error: &EngineError, _history: &History) -> Decision {
        if error.is_assertion() {
            Decision::Absorb
        } else {
            Decision::Propagate
        }
    }
}

/// Absorb the first `n` errors in scope; the `n+1`-th propagates.
///
/// The scope follows the consultation level: the current test's error count
/// for `on_test_error`, the whole run's for `on_suite_error`.
#[derive(Debug, Clone, Copy)]
pub struct AllowCount {
    limit: usize,
}

impl AllowCount {
    /// Allow up to `limit` errors in scope before propagating
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl ErrorStrategy for AllowCount {
    fn on_test_error(&self, _error: &EngineError, history: &History) -> Decision {
        let in_scope = history.current_test().map_or(0, |t| t.error_count());
        if in_scope <= self.limit {
            Decision::Absorb
        } else {
            Decision::Propagate
        }
    }

    fn on_suite_error(&self, _error: &EngineError, history: &History) -> Decision {
        if history.error_count() <= self.limit {
            Decision::Absorb
        } else {
            Decision::Propagate
        }
    }
}
