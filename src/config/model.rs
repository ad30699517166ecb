// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::UnknownReferencePolicy;

/// A graph definition as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// unknown_references = "error"
///
/// [dag.task1]
/// name = "Task1"
/// cmd = "echo one"
///
/// [dag.task2]
/// name = "Task2"
/// after = ["task1"]
/// fallback = "fallback2"
///
/// [dag.fallback2]
/// name = "FallbackTask2"
/// ```
///
/// Keys of `dag` are *task ids*; the `name` field is the display name that
/// shows up in logs, reports and exports.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDefinition {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub dag: BTreeMap<String, TaskDefinition>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigSection {
    /// How `after` / `fallback` entries naming unknown task ids are treated.
    #[serde(default)]
    pub unknown_references: UnknownReferencePolicy,
}

/// `[dag.<task-id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskDefinition {
    /// Display name, unique across the definition.
    pub name: String,

    /// Task ids that must complete before this task may run.
    #[serde(default)]
    pub after: Vec<String>,

    /// Condition identifier resolved through the
    /// [`ConditionEvaluator`](crate::condition::ConditionEvaluator).
    #[serde(default)]
    pub condition: Option<String>,

    /// Task id run in this task's place when its action fails.
    #[serde(default)]
    pub fallback: Option<String>,

    /// Shell command used as the task's action. Tasks without one get a
    /// no-op placeholder unless an action is bound programmatically.
    #[serde(default)]
    pub cmd: Option<String>,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            after: Vec::new(),
            condition: None,
            fallback: None,
            cmd: None,
        }
    }
}

/// A validated definition.
///
/// Only constructible through `TryFrom<RawDefinition>`, so holding one means:
/// - at least one task exists,
/// - display names are unique,
/// - no task is its own fallback and fallback chains are acyclic,
/// - unknown references were either rejected or dropped per
///   [`ConfigSection::unknown_references`].
///
/// Dependency cycles are still allowed here; they surface as a deadlock
/// when the graph is scheduled.
#[derive(Debug, Clone)]
pub struct Definition {
    pub config: ConfigSection,
    pub dag: BTreeMap<String, TaskDefinition>,
}

impl Definition {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        dag: BTreeMap<String, TaskDefinition>,
    ) -> Self {
        Self { config, dag }
    }

    /// Task ids referenced as someone's fallback.
    pub fn fallback_targets(&self) -> impl Iterator<Item = &str> {
        self.dag.values().filter_map(|t| t.fallback.as_deref())
    }
}
