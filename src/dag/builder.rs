// src/dag/builder.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::action::{Action, CommandAction, NoopAction};
use crate::condition::ConditionEvaluator;
use crate::config::model::Definition;
use crate::dag::graph::TaskGraph;
use crate::dag::node::NodeId;
use crate::errors::{Result, TaskGraphError};

/// Builds a [`TaskGraph`] from a validated [`Definition`].
///
/// Actions come from, in order of preference:
/// 1. an action bound with [`with_action`](Self::with_action),
/// 2. the task's `cmd`, wrapped in a [`CommandAction`],
/// 3. a [`NoopAction`] placeholder.
pub struct GraphBuilder<'a> {
    definition: &'a Definition,
    conditions: ConditionEvaluator,
    actions: HashMap<String, Arc<dyn Action>>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(definition: &'a Definition) -> Self {
        Self {
            definition,
            conditions: ConditionEvaluator::default(),
            actions: HashMap::new(),
        }
    }

    pub fn with_conditions(mut self, conditions: ConditionEvaluator) -> Self {
        self.conditions = conditions;
        self
    }

    /// Bind the action for a task id, overriding its `cmd`.
    pub fn with_action(mut self, task_id: impl Into<String>, action: Arc<dyn Action>) -> Self {
        self.actions.insert(task_id.into(), action);
        self
    }

    pub fn build(mut self) -> Result<TaskGraph> {
        if let Some(unknown) = self
            .actions
            .keys()
            .find(|id| !self.definition.dag.contains_key(id.as_str()))
        {
            return Err(TaskGraphError::TaskNotFound(unknown.clone()));
        }

        let mut graph = TaskGraph::new();
        let mut ids: HashMap<&str, NodeId> = HashMap::new();

        // First pass: node shells, so that references may point forward.
        for (task_id, task) in self.definition.dag.iter() {
            let action = match self.actions.remove(task_id) {
                Some(action) => action,
                None => match task.cmd.as_deref() {
                    Some(cmd) => Arc::new(CommandAction::new(cmd)) as Arc<dyn Action>,
                    None => Arc::new(NoopAction),
                },
            };
            let id = graph.add_node(task_id.as_str(), task.name.as_str(), action)?;
            ids.insert(task_id.as_str(), id);
        }

        // Second pass: dependencies, fallbacks and conditions.
        for (task_id, task) in self.definition.dag.iter() {
            let id = lookup(&ids, task_id)?;

            for dep in task.after.iter() {
                graph.add_dependency(id, lookup(&ids, dep)?)?;
            }
            if let Some(fallback) = task.fallback.as_deref() {
                graph.set_fallback(id, lookup(&ids, fallback)?)?;
            }
            if let Some(condition) = task.condition.as_deref() {
                graph.set_condition(id, condition, self.conditions.resolve(condition))?;
            }
        }

        debug!(
            tasks = graph.len(),
            entry_points = graph.entry_points().len(),
            "task graph built"
        );
        Ok(graph)
    }
}

fn lookup(ids: &HashMap<&str, NodeId>, task_id: &str) -> Result<NodeId> {
    ids.get(task_id)
        .copied()
        .ok_or_else(|| TaskGraphError::TaskNotFound(task_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_and_validate;

    const DEF: &str = r#"
[dag.b]
name = "B"
after = ["a"]
fallback = "fb"
condition = "never"

[dag.a]
name = "A"

[dag.fb]
name = "Fallback"
"#;

    #[test]
    fn wires_forward_references() {
        let def = parse_and_validate(DEF).unwrap();
        let graph = GraphBuilder::new(&def).build().unwrap();

        let b = graph.node_by_task_id("b").unwrap();
        let a = graph.id_of("a").unwrap();
        let fb = graph.id_of("fb").unwrap();

        assert_eq!(b.dependencies(), &[a]);
        assert_eq!(b.fallback(), Some(fb));
        assert_eq!(b.condition().map(|c| c.id.as_str()), Some("never"));
        assert_eq!(graph.entry_points(), vec![a]);
    }

    #[test]
    fn rejects_actions_for_unknown_tasks() {
        let def = parse_and_validate(DEF).unwrap();
        let err = GraphBuilder::new(&def)
            .with_action("zzz", Arc::new(NoopAction))
            .build()
            .unwrap_err();
        assert!(matches!(err, TaskGraphError::TaskNotFound(id) if id == "zzz"));
    }
}
