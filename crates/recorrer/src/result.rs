//! Fault and error types for the generation engine.

use serde::Serialize;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// A failure signalled by user-supplied model code.
///
/// Steps and lifecycle hooks return `Result<(), Fault>`; panics inside user
/// code are captured and converted to [`Fault::Error`]. The kind matters to
/// the error cascade: `IgnoreAssertions` absorbs only [`Fault::Assertion`],
/// and [`Fault::Interrupt`] is never absorbed by any strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum Fault {
    /// A model-level assertion did not hold
    #[error("assertion failed: {message}")]
    Assertion {
        /// What was expected
        message: String,
    },
    /// Any other runtime failure, including captured panics
    #[error("{message}")]
    Error {
        /// Failure description
        message: String,
    },
    /// External cancellation propagating through the run
    #[error("interrupted: {message}")]
    Interrupt {
        /// Cancellation description
        message: String,
    },
}

impl Fault {
    /// Create an assertion fault
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Create a plain runtime fault
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Create an interrupt fault
    #[must_use]
    pub fn interrupt(message: impl Into<String>) -> Self {
        Self::Interrupt {
            message: message.into(),
        }
    }

    /// Whether this fault is an assertion failure
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion { .. })
    }

    /// Whether this fault is an interrupt
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt { .. })
    }

    /// The fault message without the kind prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Assertion { message } | Self::Error { message } | Self::Interrupt { message } => {
                message
            }
        }
    }

    /// Convert a captured panic payload into a fault.
    ///
    /// Panics are classified as plain errors, not assertions: `assert!` and
    /// `unwrap` payloads are indistinguishable, so assertion semantics
    /// require returning [`Fault::Assertion`] (see the [`check!`] macro).
    ///
    /// [`check!`]: crate::check
    #[must_use]
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self::Error {
            message: format!("panicked: {message}"),
        }
    }
}

/// Run a user-supplied closure, converting panics into faults.
pub(crate) fn trap<T>(f: impl FnOnce() -> T) -> Result<T, Fault> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(Fault::from_panic)
}

/// Errors produced by the engine itself.
///
/// Propagation out of a run surfaces exactly one of these; the variant
/// indicates the cause.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A step (including its pre/post hooks) failed during execution
    #[error("step '{step}' failed in test {test}: {fault}")]
    StepFailed {
        /// 1-based index of the test the step ran in
        test: usize,
        /// Step name
        step: String,
        /// The underlying fault
        fault: Fault,
    },

    /// A lifecycle hook failed
    #[error("hook '{hook}' failed: {fault}")]
    HookFailed {
        /// Hook name (`before_suite`, `after_test`, `before`, ...)
        hook: String,
        /// The underlying fault
        fault: Fault,
    },

    /// Every guard evaluated false at once; nothing was eligible to run
    #[error("no enabled steps available in test {test}")]
    NoAvailableSteps {
        /// 1-based index of the test that stalled
        test: usize,
    },

    /// The model failed introspection-time validation
    #[error("model structure error: {detail}")]
    ModelStructure {
        /// What was wrong with the model
        detail: String,
    },

    /// The engine configuration failed construction-time validation
    #[error("configuration error: {detail}")]
    Configuration {
        /// What was wrong with the configuration
        detail: String,
    },

    /// An operation was attempted in a state that forbids it
    #[error("invalid engine state: {detail}")]
    InvalidState {
        /// What was attempted and why it is illegal
        detail: String,
    },

    /// Serializing the history or statistics failed
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a model structure error
    #[must_use]
    pub fn model_structure(detail: impl Into<String>) -> Self {
        Self::ModelStructure {
            detail: detail.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration {
            detail: detail.into(),
        }
    }

    /// Create an invalid-state error
    #[must_use]
    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::InvalidState {
            detail: detail.into(),
        }
    }

    /// The user fault behind this error, if there is one
    #[must_use]
    pub const fn fault(&self) -> Option<&Fault> {
        match self {
            Self::StepFailed { fault, .. } | Self::HookFailed { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Whether the underlying fault is an assertion failure
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        match self.fault() {
            Some(fault) => fault.is_assertion(),
            None => false,
        }
    }

    /// Whether the underlying fault is an interrupt
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        match self.fault() {
            Some(fault) => fault.is_interrupt(),
            None => false,
        }
    }
}

/// Early-return an assertion [`Fault`] when a condition does not hold.
///
/// Usable in any closure returning `Result<(), Fault>`:
///
/// ```
/// use recorrer::{check, Fault};
///
/// fn step_vend(stock: u32) -> Result<(), Fault> {
///     check!(stock > 0, "vending from empty stock");
///     Ok(())
/// }
///
/// assert!(step_vend(0).is_err());
/// assert!(step_vend(3).is_ok());
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        if !$cond {
            return Err($crate::Fault::assertion(concat!(
                "check failed: ",
                stringify!($cond)
            )));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::Fault::assertion(format!($($arg)+)));
        }
    };
}
