//! Resolved catalogue entries.
//!
//! Raw registrations on a [`ModelBuilder`](super::ModelBuilder) resolve into
//! [`Step`] values at build time; after that the catalogue never changes.

use crate::result::{trap, Fault};
use std::fmt;

/// Boxed step action: the invokable body of a step
pub type ActionFn = Box<dyn Fn() -> Result<(), Fault>>;
/// Boxed guard predicate deciding whether its step is currently enabled
pub type GuardFn = Box<dyn Fn() -> bool>;
/// Boxed computed weight provider, evaluated fresh at every selection
pub type WeightFn = Box<dyn Fn() -> f64>;
/// Boxed lifecycle or per-step hook body
pub type HookFn = Box<dyn Fn() -> Result<(), Fault>>;

/// Where a step's guard came from, after priority resolution
pub(crate) enum GuardSource {
    /// No guard anywhere: always enabled
    Always,
    /// Explicit enabled flag on the step definition
    Fixed(bool),
    /// A guard predicate (inline, declared, or conventioned)
    Predicate(GuardFn),
}

/// Where a step's weight came from, after priority resolution
pub(crate) enum WeightSource {
    /// A fixed value, validated at build time
    Fixed(f64),
    /// A computed provider, validated at every evaluation
    Computed(WeightFn),
}

/// One resolved, immutable catalogue step.
pub struct Step {
    pub(crate) name: String,
    pub(crate) action: ActionFn,
    pub(crate) guard: GuardSource,
    pub(crate) weight: WeightSource,
    pub(crate) pre: Option<HookFn>,
    pub(crate) post: Option<HookFn>,
}

impl Step {
    /// The step's catalogue name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the guard. A panicking guard surfaces as a fault.
    pub(crate) fn evaluate_guard(&self) -> Result<bool, Fault> {
        match &self.guard {
            GuardSource::Always => Ok(true),
            GuardSource::Fixed(enabled) => Ok(*enabled),
            GuardSource::Predicate(predicate) => trap(|| predicate()),
        }
    }

    /// Evaluate the weight without validating the produced value.
    pub(crate) fn evaluate_weight(&self) -> Result<f64, Fault> {
        match &self.weight {
            WeightSource::Fixed(weight) => Ok(*weight),
            WeightSource::Computed(provider) => trap(|| provider()),
        }
    }

    pub(crate) const fn has_fixed_weight(&self) -> bool {
        matches!(self.weight, WeightSource::Fixed(_))
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = match &self.guard {
            GuardSource::Always => "always",
            GuardSource::Fixed(true) => "enabled",
            GuardSource::Fixed(false) => "disabled",
            GuardSource::Predicate(_) => "predicate",
        };
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("guard", &guard)
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn plain_step(guard: GuardSource, weight: WeightSource) -> Step {
        Step {
            name: "sample".to_string(),
            action: Box::new(|| Ok(())),
            guard,
            weight,
            pre: None,
            post: None,
        }
    }

    #[test]
    fn test_guard_defaults_to_enabled() {
        let step = plain_step(GuardSource::Always, WeightSource::Fixed(1.0));
        assert_eq!(step.evaluate_guard(), Ok(true));
    }

    #[test]
    fn test_fixed_guard_flag() {
        let step = plain_step(GuardSource::Fixed(false), WeightSource::Fixed(1.0));
        assert_eq!(step.evaluate_guard(), Ok(false));
    }

    #[test]
    fn test_predicate_guard_panic_is_a_fault() {
        let step = plain_step(
            GuardSource::Predicate(Box::new(|| panic!("guard exploded"))),
            WeightSource::Fixed(1.0),
        );
        let fault = step.evaluate_guard().unwrap_err();
        assert!(fault.message().contains("guard exploded"));
    }

    #[test]
    fn test_computed_weight_evaluates_fresh() {
        use std::cell::Cell;
        use std::rc::Rc;

        let calls = Rc::new(Cell::new(0.0_f64));
        let captured = Rc::clone(&calls);
        let step = plain_step(
            GuardSource::Always,
            WeightSource::Computed(Box::new(move || {
                captured.set(captured.get() + 1.0);
                captured.get()
            })),
        );
        assert_eq!(step.evaluate_weight(), Ok(1.0));
        assert_eq!(step.evaluate_weight(), Ok(2.0));
        assert!(!step.has_fixed_weight());
    }

    #[test]
    fn test_debug_shows_guard_kind() {
        let step = plain_step(GuardSource::Fixed(true), WeightSource::Fixed(1.0));
        let rendered = format!("{step:?}");
        assert!(rendered.contains("enabled"));
        assert!(rendered.contains("sample"));
    }
}
