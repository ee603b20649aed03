//! Model introspection: the immutable step catalogue.
//!
//! A model object is registered through a [`ModelBuilder`] and resolved
//! once into steps, guards, weights, and lifecycle hooks. One or more
//! objects union into a [`ModelSet`], the catalogue the engine walks.

mod builder;
mod step;

pub use builder::{ModelBuilder, StepDef};
pub use step::{ActionFn, GuardFn, HookFn, Step, WeightFn};

use crate::algorithm::Candidate;
use crate::result::{EngineError, EngineResult};
use std::fmt;

/// The six lifecycle hook slots a model object may fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Runs once before the first test of the suite
    BeforeSuite,
    /// Runs once after the last test of the suite
    AfterSuite,
    /// Runs before every test
    BeforeTest,
    /// Runs after every test
    AfterTest,
    /// Runs before every step
    Before,
    /// Runs after every step
    After,
}

impl Hook {
    /// The reserved member name for this hook
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeSuite => "before_suite",
            Self::AfterSuite => "after_suite",
            Self::BeforeTest => "before_test",
            Self::AfterTest => "after_test",
            Self::Before => "before",
            Self::After => "after",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "before_suite" => Some(Self::BeforeSuite),
            "after_suite" => Some(Self::AfterSuite),
            "before_test" => Some(Self::BeforeTest),
            "after_test" => Some(Self::AfterTest),
            "before" => Some(Self::Before),
            "after" => Some(Self::After),
            _ => None,
        }
    }
}

/// Lifecycle hook bodies of one model object, one slot per [`Hook`].
#[derive(Default)]
pub(crate) struct HookSet {
    before_suite: Option<HookFn>,
    after_suite: Option<HookFn>,
    before_test: Option<HookFn>,
    after_test: Option<HookFn>,
    before: Option<HookFn>,
    after: Option<HookFn>,
}

impl HookSet {
    pub(crate) fn get(&self, hook: Hook) -> Option<&HookFn> {
        match hook {
            Hook::BeforeSuite => self.before_suite.as_ref(),
            Hook::AfterSuite => self.after_suite.as_ref(),
            Hook::BeforeTest => self.before_test.as_ref(),
            Hook::AfterTest => self.after_test.as_ref(),
            Hook::Before => self.before.as_ref(),
            Hook::After => self.after.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, hook: Hook, body: HookFn) {
        let slot = match hook {
            Hook::BeforeSuite => &mut self.before_suite,
            Hook::AfterSuite => &mut self.after_suite,
            Hook::BeforeTest => &mut self.before_test,
            Hook::AfterTest => &mut self.after_test,
            Hook::Before => &mut self.before,
            Hook::After => &mut self.after,
        };
        *slot = Some(body);
    }
}

/// Opaque identity of a catalogue step: which object, which step slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepId {
    pub(crate) object: usize,
    pub(crate) step: usize,
}

/// One resolved model object: its steps and lifecycle hooks.
pub struct ModelObject {
    pub(crate) name: String,
    pub(crate) steps: Vec<Step>,
    pub(crate) hooks: HookSet,
}

impl ModelObject {
    /// The object's registration name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The object's resolved steps, in registration order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The object's step names, in registration order
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(Step::name).collect()
    }

    pub(crate) fn hooks(&self) -> &HookSet {
        &self.hooks
    }
}

impl fmt::Debug for ModelObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelObject")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish_non_exhaustive()
    }
}

/// The union catalogue the engine walks: one or more model objects.
///
/// Step names stay unique across the whole set; lifecycle hooks run in the
/// order the objects were supplied.
pub struct ModelSet {
    objects: Vec<ModelObject>,
}

impl ModelSet {
    /// Union one or more model objects into a catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelStructure`] when step names collide
    /// across objects or when the union contains no steps at all.
    pub fn from_objects(objects: Vec<ModelObject>) -> EngineResult<Self> {
        let mut seen: Vec<&str> = Vec::new();
        for object in &objects {
            for step in &object.steps {
                if seen.contains(&step.name()) {
                    return Err(EngineError::model_structure(format!(
                        "step '{}' appears in more than one model object",
                        step.name()
                    )));
                }
                seen.push(step.name());
            }
        }
        if seen.is_empty() {
            return Err(EngineError::model_structure("model has no steps"));
        }
        Ok(Self { objects })
    }

    /// Catalogue of a single model object.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelStructure`] when the object has no steps.
    pub fn single(object: ModelObject) -> EngineResult<Self> {
        Self::from_objects(vec![object])
    }

    /// Every catalogued step name, in supply order
    #[must_use]
    pub fn step_names(&self) -> Vec<String> {
        self.objects
            .iter()
            .flat_map(|o| o.steps.iter().map(|s| s.name.clone()))
            .collect()
    }

    /// Total number of catalogued steps
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.objects.iter().map(|o| o.steps.len()).sum()
    }

    pub(crate) fn objects(&self) -> &[ModelObject] {
        &self.objects
    }

    pub(crate) fn step(&self, id: StepId) -> &Step {
        &self.objects[id.object].steps[id.step]
    }

    /// Evaluate every guard, returning the enabled set with fresh weights.
    ///
    /// A guard fault is a test-level step error; an invalid computed weight
    /// is a model structure error. Both route through the cascade.
    pub(crate) fn enabled_candidates(&self, test: usize) -> EngineResult<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for (object_index, object) in self.objects.iter().enumerate() {
            for (step_index, step) in object.steps.iter().enumerate() {
                let enabled = step.evaluate_guard().map_err(|fault| {
                    EngineError::StepFailed {
                        test,
                        step: step.name().to_string(),
                        fault,
                    }
                })?;
                if !enabled {
                    continue;
                }
                let weight = step.evaluate_weight().map_err(|fault| {
                    EngineError::StepFailed {
                        test,
                        step: step.name().to_string(),
                        fault,
                    }
                })?;
                let weight = if step.has_fixed_weight() {
                    weight
                } else {
                    validate_weight(weight, &object.name, step.name())?
                };
                candidates.push(Candidate {
                    id: StepId {
                        object: object_index,
                        step: step_index,
                    },
                    name: step.name().to_string(),
                    weight,
                });
            }
        }
        Ok(candidates)
    }
}

impl fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSet")
            .field("objects", &self.objects.len())
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Weights must be finite and strictly positive.
pub(crate) fn validate_weight(weight: f64, object: &str, step: &str) -> EngineResult<f64> {
    if weight.is_finite() && weight > 0.0 {
        Ok(weight)
    } else {
        Err(EngineError::model_structure(format!(
            "model '{object}': step '{step}' has invalid weight {weight}; weights must be finite and strictly positive"
        )))
    }
}
