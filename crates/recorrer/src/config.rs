//! Engine run configuration.
//!
//! Captured once at engine construction; a running engine is never
//! reconfigured. Build a new engine for a new configuration.

use crate::algorithm::{Algorithm, Random};
use crate::end_condition::{EndCondition, Length};
use crate::error_strategy::{AlwaysRaise, ErrorStrategy};
use crate::rng::Seed;
use std::fmt;

/// Everything a generation run can be configured with.
pub struct EngineConfig {
    /// RNG seed; derived from the wall clock and recorded when omitted
    pub seed: Option<Seed>,
    /// Step selection algorithm
    pub algorithm: Box<dyn Algorithm>,
    /// When the current test ends
    pub test_end_condition: Box<dyn EndCondition>,
    /// When the whole suite ends
    pub suite_end_condition: Box<dyn EndCondition>,
    /// Error policy at the test level
    pub test_error_strategy: Box<dyn ErrorStrategy>,
    /// Error policy at the suite level
    pub suite_error_strategy: Box<dyn ErrorStrategy>,
    /// End the suite on any propagated test error, skipping the suite strategy
    pub stop_on_fail: bool,
    /// End the current test on any absorbed non-assertion step error
    pub stop_test_on_exception: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            algorithm: Box::new(Random),
            test_end_condition: Box::new(Length::of(10)),
            suite_end_condition: Box::new(Length::of(1)),
            test_error_strategy: Box::new(AlwaysRaise),
            suite_error_strategy: Box::new(AlwaysRaise),
            stop_on_fail: true,
            stop_test_on_exception: true,
        }
    }
}

impl EngineConfig {
    /// Create a builder seeded with the defaults
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("seed", &self.seed)
            .field("stop_on_fail", &self.stop_on_fail)
            .field("stop_test_on_exception", &self.stop_test_on_exception)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EngineConfig`]
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the RNG seed
    #[must_use]
    pub fn seed(mut self, seed: impl Into<Seed>) -> Self {
        self.config.seed = Some(seed.into());
        self
    }

    /// Set the selection algorithm
    #[must_use]
    pub fn algorithm(mut self, algorithm: impl Algorithm + 'static) -> Self {
        self.config.algorithm = Box::new(algorithm);
        self
    }

    /// Set the test-level end condition
    #[must_use]
    pub fn test_end_condition(mut self, condition: impl EndCondition + 'static) -> Self {
        self.config.test_end_condition = Box::new(condition);
        self
    }

    /// Set the suite-level end condition
    #[must_use]
    pub fn suite_end_condition(mut self, condition: impl EndCondition + 'static) -> Self {
        self.config.suite_end_condition = Box::new(condition);
        self
    }

    /// Set the test-level error strategy
    #[must_use]
    pub fn test_error_strategy(mut self, strategy: impl ErrorStrategy + 'static) -> Self {
        self.config.test_error_strategy = Box::new(strategy);
        self
    }

    /// Set the suite-level error strategy
    #[must_use]
    pub fn suite_error_strategy(mut self, strategy: impl ErrorStrategy + 'static) -> Self {
        self.config.suite_error_strategy = Box::new(strategy);
        self
    }

    /// Enable or disable ending the suite on any propagated test error
    #[must_use]
    pub fn stop_on_fail(mut self, enabled: bool) -> Self {
        self.config.stop_on_fail = enabled;
        self
    }

    /// Enable or disable cutting a test on absorbed non-assertion errors
    #[must_use]
    pub fn stop_test_on_exception(mut self, enabled: bool) -> Self {
        self.config.stop_test_on_exception = enabled;
        self
    }

    /// Finish the configuration
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl fmt::Debug for EngineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}
