//! Model registration and introspection.
//!
//! A model is registered through two coexisting mechanisms:
//!
//! 1. **Naming convention** — raw members whose names follow a closed
//!    grammar: `step_X` actions, `guard_X` predicates, `weight_X` scalars,
//!    `pre_X`/`post_X` step hooks, and the six lifecycle hook names.
//! 2. **Explicit annotation** — [`StepDef`] values carrying inline guard,
//!    weight, and hook attachments, plus `guard_for`/`weight_for`
//!    declarations bound to a step by name.
//!
//! Anything outside the grammar is rejected at build time; nothing is
//! silently ignored. A step may be introduced by only one mechanism.

use super::step::{ActionFn, GuardFn, GuardSource, HookFn, Step, WeightFn, WeightSource};
use super::{validate_weight, Hook, ModelObject};
use crate::result::{EngineError, EngineResult, Fault};
use std::collections::BTreeMap;
use std::fmt;

/// An explicitly annotated step definition.
///
/// Inline attributes take the highest slots of the guard and weight
/// priority chains; declared and conventioned attachments fill the rest.
pub struct StepDef {
    name: String,
    action: ActionFn,
    enabled: Option<bool>,
    guard: Option<GuardFn>,
    weight: Option<f64>,
    weight_fn: Option<WeightFn>,
    pre: Option<HookFn>,
    post: Option<HookFn>,
}

impl StepDef {
    /// Define a step with the given catalogue name and action
    #[must_use]
    pub fn new(name: impl Into<String>, action: impl Fn() -> Result<(), Fault> + 'static) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
            enabled: None,
            guard: None,
            weight: None,
            weight_fn: None,
            pre: None,
            post: None,
        }
    }

    /// Set the explicit enabled flag; overrides every other guard source
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Attach an inline guard predicate
    #[must_use]
    pub fn guard(mut self, guard: impl Fn() -> bool + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Set an explicit fixed weight; must be finite and strictly positive
    #[must_use]
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Attach an inline computed weight provider
    #[must_use]
    pub fn weight_with(mut self, provider: impl Fn() -> f64 + 'static) -> Self {
        self.weight_fn = Some(Box::new(provider));
        self
    }

    /// Attach an inline pre-hook, run immediately before the action
    #[must_use]
    pub fn pre(mut self, hook: impl Fn() -> Result<(), Fault> + 'static) -> Self {
        self.pre = Some(Box::new(hook));
        self
    }

    /// Attach an inline post-hook, run immediately after the action
    #[must_use]
    pub fn post(mut self, hook: impl Fn() -> Result<(), Fault> + 'static) -> Self {
        self.post = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for StepDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDef")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// Builder producing one immutable [`ModelObject`].
pub struct ModelBuilder {
    name: String,
    defs: Vec<StepDef>,
    convention_steps: Vec<(String, ActionFn)>,
    guard_members: Vec<(String, GuardFn)>,
    weight_members: Vec<(String, WeightFn)>,
    pre_members: Vec<(String, HookFn)>,
    post_members: Vec<(String, HookFn)>,
    lifecycle: Vec<(Hook, HookFn)>,
    declared_guards: Vec<(String, GuardFn)>,
    declared_weights: Vec<(String, f64)>,
    invalid: Vec<String>,
}

impl ModelBuilder {
    /// Start a builder for a named model object
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defs: Vec::new(),
            convention_steps: Vec::new(),
            guard_members: Vec::new(),
            weight_members: Vec::new(),
            pre_members: Vec::new(),
            post_members: Vec::new(),
            lifecycle: Vec::new(),
            declared_guards: Vec::new(),
            declared_weights: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Register an explicitly annotated step
    #[must_use]
    pub fn step(mut self, def: StepDef) -> Self {
        self.defs.push(def);
        self
    }

    /// Register a raw function member, classified by its name.
    ///
    /// Recognized: `step_X`, `pre_X`, `post_X`, and the lifecycle hook
    /// names `before_suite`, `after_suite`, `before_test`, `after_test`,
    /// `before`, `after`. Any other name fails the build.
    #[must_use]
    pub fn function(
        mut self,
        name: impl Into<String>,
        f: impl Fn() -> Result<(), Fault> + 'static,
    ) -> Self {
        let name = name.into();
        if let Some(hook) = Hook::from_name(&name) {
            self.lifecycle.push((hook, Box::new(f)));
        } else if let Some(step) = suffix_after(&name, "step_") {
            self.convention_steps.push((step.to_string(), Box::new(f)));
        } else if let Some(step) = suffix_after(&name, "pre_") {
            self.pre_members.push((step.to_string(), Box::new(f)));
        } else if let Some(step) = suffix_after(&name, "post_") {
            self.post_members.push((step.to_string(), Box::new(f)));
        } else {
            self.invalid.push(name);
        }
        self
    }

    /// Register a raw predicate member; only `guard_X` names are legal
    #[must_use]
    pub fn predicate(mut self, name: impl Into<String>, f: impl Fn() -> bool + 'static) -> Self {
        let name = name.into();
        if let Some(step) = suffix_after(&name, "guard_") {
            self.guard_members.push((step.to_string(), Box::new(f)));
        } else {
            self.invalid.push(name);
        }
        self
    }

    /// Register a raw scalar member; only `weight_X` names are legal
    #[must_use]
    pub fn scalar(mut self, name: impl Into<String>, f: impl Fn() -> f64 + 'static) -> Self {
        let name = name.into();
        if let Some(step) = suffix_after(&name, "weight_") {
            self.weight_members.push((step.to_string(), Box::new(f)));
        } else {
            self.invalid.push(name);
        }
        self
    }

    /// Declare a guard applying to the named step
    #[must_use]
    pub fn guard_for(
        mut self,
        step: impl Into<String>,
        f: impl Fn() -> bool + 'static,
    ) -> Self {
        self.declared_guards.push((step.into(), Box::new(f)));
        self
    }

    /// Declare a fixed weight applying to the named step
    #[must_use]
    pub fn weight_for(mut self, step: impl Into<String>, weight: f64) -> Self {
        self.declared_weights.push((step.into(), weight));
        self
    }

    /// Register a lifecycle hook explicitly
    #[must_use]
    pub fn hook(mut self, hook: Hook, f: impl Fn() -> Result<(), Fault> + 'static) -> Self {
        self.lifecycle.push((hook, Box::new(f)));
        self
    }

    /// Resolve every registration into an immutable catalogue object.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelStructure`] for names outside the
    /// grammar, duplicate steps, steps introduced by both mechanisms,
    /// double-bound attribute slots, dangling referents, or invalid fixed
    /// weights.
    #[allow(clippy::too_many_lines)]
    pub fn build(self) -> EngineResult<ModelObject> {
        let Self {
            name: object_name,
            defs,
            convention_steps,
            guard_members,
            weight_members,
            pre_members,
            post_members,
            lifecycle,
            declared_guards,
            declared_weights,
            invalid,
        } = self;

        if let Some(bad) = invalid.first() {
            return Err(EngineError::model_structure(format!(
                "model '{object_name}': member name '{bad}' matches no recognized form"
            )));
        }

        // Collect step names, rejecting duplicates and cross-mechanism clashes.
        let mut names: Vec<String> = Vec::new();
        for def in &defs {
            if def.name.is_empty() {
                return Err(EngineError::model_structure(format!(
                    "model '{object_name}': step with an empty name"
                )));
            }
            if names.contains(&def.name) {
                return Err(EngineError::model_structure(format!(
                    "model '{object_name}': step '{}' declared more than once",
                    def.name
                )));
            }
            names.push(def.name.clone());
        }
        for (step_name, _) in &convention_steps {
            if defs.iter().any(|d| d.name == *step_name) {
                return Err(EngineError::model_structure(format!(
                    "model '{object_name}': step '{step_name}' declared by both annotation and naming convention"
                )));
            }
            if names.contains(step_name) {
                return Err(EngineError::model_structure(format!(
                    "model '{object_name}': step '{step_name}' declared more than once"
                )));
            }
            names.push(step_name.clone());
        }

        // Every by-name attachment must land on an existing step, once.
        let mut guards = into_unique_map(&object_name, "guard", declared_guards, &names)?;
        let mut guard_conventions = into_unique_map(&object_name, "guard", guard_members, &names)?;
        let mut weights = into_unique_map(&object_name, "weight", declared_weights, &names)?;
        let mut weight_conventions =
            into_unique_map(&object_name, "weight", weight_members, &names)?;
        let mut pres = into_unique_map(&object_name, "pre hook", pre_members, &names)?;
        let mut posts = into_unique_map(&object_name, "post hook", post_members, &names)?;

        let mut steps = Vec::with_capacity(names.len());
        for def in defs {
            let StepDef {
                name,
                action,
                enabled,
                guard,
                weight,
                weight_fn,
                pre,
                post,
            } = def;

            let guard = resolve_guard(
                &object_name,
                &name,
                enabled,
                guard,
                guards.remove(&name),
                guard_conventions.remove(&name),
            )?;
            let weight = resolve_weight(
                &object_name,
                &name,
                weight,
                weight_fn,
                weights.remove(&name),
                weight_conventions.remove(&name),
            )?;
            let pre = resolve_step_hook(&object_name, &name, "pre", pre, pres.remove(&name))?;
            let post = resolve_step_hook(&object_name, &name, "post", post, posts.remove(&name))?;

            steps.push(Step {
                name,
                action,
                guard,
                weight,
                pre,
                post,
            });
        }
        for (name, action) in convention_steps {
            let guard = resolve_guard(
                &object_name,
                &name,
                None,
                None,
                guards.remove(&name),
                guard_conventions.remove(&name),
            )?;
            let weight = resolve_weight(
                &object_name,
                &name,
                None,
                None,
                weights.remove(&name),
                weight_conventions.remove(&name),
            )?;
            let pre = resolve_step_hook(&object_name, &name, "pre", None, pres.remove(&name))?;
            let post = resolve_step_hook(&object_name, &name, "post", None, posts.remove(&name))?;

            steps.push(Step {
                name,
                action,
                guard,
                weight,
                pre,
                post,
            });
        }

        // One hook body per lifecycle slot.
        let mut hooks = super::HookSet::default();
        for (hook, body) in lifecycle {
            if hooks.get(hook).is_some() {
                return Err(EngineError::model_structure(format!(
                    "model '{object_name}': hook '{}' registered more than once",
                    hook.name()
                )));
            }
            hooks.set(hook, body);
        }

        Ok(ModelObject {
            name: object_name,
            steps,
            hooks,
        })
    }
}

impl fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("name", &self.name)
            .field("annotated_steps", &self.defs.len())
            .field("convention_steps", &self.convention_steps.len())
            .finish_non_exhaustive()
    }
}

fn suffix_after<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

/// Index by-name attachments, rejecting duplicates and dangling referents.
fn into_unique_map<T>(
    object: &str,
    what: &str,
    entries: Vec<(String, T)>,
    steps: &[String],
) -> EngineResult<BTreeMap<String, T>> {
    let mut map = BTreeMap::new();
    for (step, value) in entries {
        if !steps.contains(&step) {
            return Err(EngineError::model_structure(format!(
                "model '{object}': {what} refers to unknown step '{step}'"
            )));
        }
        if map.insert(step.clone(), value).is_some() {
            return Err(EngineError::model_structure(format!(
                "model '{object}': {what} for step '{step}' bound more than once"
            )));
        }
    }
    Ok(map)
}

fn resolve_guard(
    object: &str,
    step: &str,
    enabled: Option<bool>,
    inline: Option<GuardFn>,
    declared: Option<GuardFn>,
    convention: Option<GuardFn>,
) -> EngineResult<GuardSource> {
    // An inline guard shadowed by a fixed flag is almost certainly a
    // mistake in the model; reject instead of silently preferring the flag.
    if enabled.is_some() && inline.is_some() {
        return Err(EngineError::model_structure(format!(
            "model '{object}': step '{step}' has both an enabled flag and an inline guard"
        )));
    }
    let source = if let Some(flag) = enabled {
        GuardSource::Fixed(flag)
    } else if let Some(guard) = inline {
        GuardSource::Predicate(guard)
    } else if let Some(guard) = declared {
        GuardSource::Predicate(guard)
    } else if let Some(guard) = convention {
        GuardSource::Predicate(guard)
    } else {
        GuardSource::Always
    };
    Ok(source)
}

fn resolve_weight(
    object: &str,
    step: &str,
    fixed: Option<f64>,
    inline: Option<WeightFn>,
    declared: Option<f64>,
    convention: Option<WeightFn>,
) -> EngineResult<WeightSource> {
    if fixed.is_some() && inline.is_some() {
        return Err(EngineError::model_structure(format!(
            "model '{object}': step '{step}' has both a fixed weight and a computed provider"
        )));
    }
    let source = if let Some(weight) = fixed {
        WeightSource::Fixed(validate_weight(weight, object, step)?)
    } else if let Some(provider) = inline {
        WeightSource::Computed(provider)
    } else if let Some(weight) = declared {
        WeightSource::Fixed(validate_weight(weight, object, step)?)
    } else if let Some(provider) = convention {
        WeightSource::Computed(provider)
    } else {
        WeightSource::Fixed(1.0)
    };
    Ok(source)
}

fn resolve_step_hook(
    object: &str,
    step: &str,
    which: &str,
    inline: Option<HookFn>,
    convention: Option<HookFn>,
) -> EngineResult<Option<HookFn>> {
    match (inline, convention) {
        (Some(_), Some(_)) => Err(EngineError::model_structure(format!(
            "model '{object}': {which} hook for step '{step}' bound twice"
        ))),
        (Some(hook), None) | (None, Some(hook)) => Ok(Some(hook)),
        (None, None) => Ok(None),
    }
}
