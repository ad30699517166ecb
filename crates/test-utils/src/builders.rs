#![allow(dead_code)]

use std::collections::BTreeMap;
use taskgraph::config::{ConfigSection, Definition, RawDefinition, TaskDefinition};
use taskgraph::types::UnknownReferencePolicy;

/// Builder for `Definition` to simplify test setup.
pub struct DefinitionBuilder {
    raw: RawDefinition,
}

impl DefinitionBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawDefinition {
                config: ConfigSection::default(),
                dag: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, id: &str, task: TaskDefinition) -> Self {
        self.raw.dag.insert(id.to_string(), task);
        self
    }

    pub fn unknown_references(mut self, policy: UnknownReferencePolicy) -> Self {
        self.raw.config.unknown_references = policy;
        self
    }

    /// The unvalidated definition, for tests exercising validation.
    pub fn build_raw(self) -> RawDefinition {
        self.raw
    }

    pub fn build(self) -> Definition {
        Definition::try_from(self.raw).expect("Failed to build valid definition from builder")
    }
}

impl Default for DefinitionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskDefinition`.
pub struct TaskBuilder {
    task: TaskDefinition,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TaskDefinition::new(name),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn condition(mut self, id: &str) -> Self {
        self.task.condition = Some(id.to_string());
        self
    }

    pub fn fallback(mut self, id: &str) -> Self {
        self.task.fallback = Some(id.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.cmd = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.task
    }
}
