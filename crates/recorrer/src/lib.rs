//! Recorrer: model-based test generation for Rust.
//!
//! Recorrer (Spanish: "to traverse") walks a user-supplied model of guarded
//! steps and generates test sequences from it: a suite of tests, each a
//! sequence of steps picked by a selection algorithm, bounded by end
//! conditions, with errors routed through a two-level strategy cascade.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   enabled steps    ┌────────────┐
//! │   Model    │───────────────────►│  Algorithm │
//! │ (catalogue)│                    │ (selection)│
//! └─────┬──────┘                    └─────┬──────┘
//!       │ hooks / actions                 │ chosen step
//!       ▼                                 ▼
//! ┌─────────────────────────────────────────────┐
//! │                  Engine                     │
//! │  suite → test → step nested state machine   │
//! └───┬─────────────────────────────────────┬───┘
//!     │ records                             │ errors
//!     ▼                                     ▼
//! ┌────────────┐  queries  ┌──────────────────┐
//! │  History   │◄──────────│  End conditions  │
//! │  (ledger)  │           │  Error strategies│
//! └────────────┘           └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use recorrer::{Engine, EngineConfig, Length, ModelBuilder, ModelSet, StepDef};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let value = Rc::new(Cell::new(0_i32));
//!
//! let model = ModelBuilder::new("counter")
//!     .step(StepDef::new("increment", {
//!         let v = Rc::clone(&value);
//!         move || {
//!             v.set(v.get() + 1);
//!             Ok(())
//!         }
//!     }))
//!     .step(
//!         StepDef::new("decrement", {
//!             let v = Rc::clone(&value);
//!             move || {
//!                 v.set(v.get() - 1);
//!                 Ok(())
//!             }
//!         })
//!         .guard({
//!             let v = Rc::clone(&value);
//!             move || v.get() > 0
//!         }),
//!     )
//!     .build()?;
//!
//! let config = EngineConfig::builder()
//!     .seed(333_u64)
//!     .test_end_condition(Length::new(10)?)
//!     .suite_end_condition(Length::new(1)?)
//!     .build();
//!
//! let report = Engine::new(ModelSet::single(model)?, config).run();
//! assert!(report.passed());
//! assert_eq!(report.history.total_steps(), 10);
//! assert!(value.get() >= 0);
//! # Ok::<(), recorrer::EngineError>(())
//! ```

#![warn(missing_docs)]

mod algorithm;
mod config;
mod end_condition;
mod engine;
mod error_strategy;
mod history;
mod model;
mod result;
mod rng;

pub use algorithm::{Algorithm, Balancing, Candidate, Random, Weighted, WeightedBalancing};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use end_condition::{And, EndCondition, Endless, Length, Or, StepCoverage, Time};
pub use engine::{Engine, Phase, RunReport};
pub use error_strategy::{
    AllowCount, AlwaysIgnore, AlwaysRaise, Decision, ErrorStrategy, IgnoreAssertions,
};
pub use history::{FailureRecord, History, RunStatistics, StepRecord, TestCaseRecord};
pub use model::{
    ActionFn, GuardFn, Hook, HookFn, ModelBuilder, ModelObject, ModelSet, Step, StepDef, StepId,
    WeightFn,
};
pub use result::{EngineError, EngineResult, Fault};
pub use rng::{Seed, TestRng};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::algorithm::{
        Algorithm, Balancing, Candidate, Random, Weighted, WeightedBalancing,
    };
    pub use super::config::{EngineConfig, EngineConfigBuilder};
    pub use super::end_condition::{And, EndCondition, Endless, Length, Or, StepCoverage, Time};
    pub use super::engine::{Engine, Phase, RunReport};
    pub use super::error_strategy::{
        AllowCount, AlwaysIgnore, AlwaysRaise, Decision, ErrorStrategy, IgnoreAssertions,
    };
    pub use super::history::{FailureRecord, History, RunStatistics, StepRecord, TestCaseRecord};
    pub use super::model::{
        ActionFn, GuardFn, Hook, HookFn, ModelBuilder, ModelObject, ModelSet, Step, StepDef,
        StepId, WeightFn,
    };
    pub use super::result::{EngineError, EngineResult, Fault};
    pub use super::rng::{Seed, TestRng};
}
