// src/condition.rs

//! Condition gates.
//!
//! A [`Condition`] is a side-effect-free predicate consulted right before a
//! task's action. The [`ConditionEvaluator`] maps the identifiers used in
//! definitions (`condition = "random_condition"`) to predicates.
//!
//! Unknown identifiers resolve to [`Always`]: an unrecognised condition never
//! blocks a task.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

/// A predicate failed to produce an answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("condition evaluation failed: {0}")]
pub struct ConditionError(pub String);

/// Zero-argument boolean capability gating a task.
pub trait Condition: Send + Sync {
    fn evaluate(&self) -> Result<bool, ConditionError>;
}

impl<F> Condition for F
where
    F: Fn() -> Result<bool, ConditionError> + Send + Sync,
{
    fn evaluate(&self) -> Result<bool, ConditionError> {
        self()
    }
}

/// Wrap an infallible predicate.
pub fn predicate<F>(f: F) -> Arc<dyn Condition>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    Arc::new(move || -> Result<bool, ConditionError> { Ok(f()) })
}

#[derive(Debug, Clone, Copy)]
pub struct Always;

impl Condition for Always {
    fn evaluate(&self) -> Result<bool, ConditionError> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Never;

impl Condition for Never {
    fn evaluate(&self) -> Result<bool, ConditionError> {
        Ok(false)
    }
}

/// Coin flip.
#[derive(Debug, Clone, Copy)]
pub struct RandomChoice;

impl Condition for RandomChoice {
    fn evaluate(&self) -> Result<bool, ConditionError> {
        Ok(rand::thread_rng().gen_bool(0.5))
    }
}

/// True iff the environment variable is set to a non-empty value.
#[derive(Debug, Clone)]
pub struct EnvVarSet(pub String);

impl Condition for EnvVarSet {
    fn evaluate(&self) -> Result<bool, ConditionError> {
        match std::env::var(&self.0) {
            Ok(value) => Ok(!value.is_empty()),
            Err(std::env::VarError::NotPresent) => Ok(false),
            Err(e) => Err(ConditionError(format!("{}: {e}", self.0))),
        }
    }
}

const ENV_PREFIX: &str = "env:";

/// Registry of named conditions.
#[derive(Clone)]
pub struct ConditionEvaluator {
    conditions: HashMap<String, Arc<dyn Condition>>,
}

impl ConditionEvaluator {
    /// An evaluator with no registered identifiers; everything resolves to
    /// [`Always`] except `env:<VAR>` lookups.
    pub fn empty() -> Self {
        Self {
            conditions: HashMap::new(),
        }
    }

    /// An evaluator with `always`, `never` and `random_condition` registered.
    pub fn new() -> Self {
        let mut evaluator = Self::empty();
        evaluator.register("always", Arc::new(Always));
        evaluator.register("never", Arc::new(Never));
        evaluator.register("random_condition", Arc::new(RandomChoice));
        evaluator
    }

    /// Register (or replace) the predicate behind `id`.
    pub fn register(&mut self, id: impl Into<String>, condition: Arc<dyn Condition>) {
        let id = id.into();
        debug!(condition = %id, "registering condition");
        self.conditions.insert(id, condition);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, id: impl Into<String>, condition: Arc<dyn Condition>) -> Self {
        self.register(id, condition);
        self
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.conditions.contains_key(id) || id.starts_with(ENV_PREFIX)
    }

    /// Resolve an identifier to its predicate. Never fails.
    pub fn resolve(&self, id: &str) -> Arc<dyn Condition> {
        if let Some(condition) = self.conditions.get(id) {
            return Arc::clone(condition);
        }
        if let Some(var) = id.strip_prefix(ENV_PREFIX) {
            return Arc::new(EnvVarSet(var.to_string()));
        }
        info!(condition = %id, "unknown condition; treating as always true");
        Arc::new(Always)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(|s| s.as_str())
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.identifiers().collect();
        ids.sort_unstable();
        f.debug_struct("ConditionEvaluator")
            .field("conditions", &ids)
            .finish()
    }
}
