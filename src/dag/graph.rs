// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::action::Action;
use crate::condition::Condition;
use crate::dag::node::{NodeCondition, NodeId, NodeOutcome, TaskNode};
use crate::errors::{Result, TaskGraphError};

/// Arena of task nodes.
///
/// Nodes refer to each other by [`NodeId`], so a dependency or fallback can
/// be shared by any number of nodes. Structure is wired once (usually by the
/// [`GraphBuilder`](crate::dag::GraphBuilder)); afterwards only outcome
/// fields change.
#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    by_task_id: HashMap<String, NodeId>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node shell with no edges.
    ///
    /// Fails if `task_id` or `name` is already taken.
    pub fn add_node(
        &mut self,
        task_id: impl Into<String>,
        name: impl Into<String>,
        action: Arc<dyn Action>,
    ) -> Result<NodeId> {
        let task_id = task_id.into();
        let name = name.into();

        if self.by_task_id.contains_key(&task_id) {
            return Err(TaskGraphError::DefinitionError(format!(
                "task id '{task_id}' added twice"
            )));
        }
        if let Some(existing) = self.node_by_name(&name) {
            return Err(TaskGraphError::DuplicateName {
                name,
                first: existing.task_id.clone(),
                second: task_id,
            });
        }

        let id = NodeId(self.nodes.len());
        self.by_task_id.insert(task_id.clone(), id);
        self.nodes.push(TaskNode::new(id, task_id, name, action));
        Ok(id)
    }

    /// `node` will wait for `dependency` to complete.
    pub fn add_dependency(&mut self, node: NodeId, dependency: NodeId) -> Result<()> {
        self.check(dependency)?;
        self.node_mut(node)?.dependencies.push(dependency);
        Ok(())
    }

    pub fn set_fallback(&mut self, node: NodeId, fallback: NodeId) -> Result<()> {
        self.check(fallback)?;
        self.node_mut(node)?.fallback = Some(fallback);
        Ok(())
    }

    pub fn set_condition(
        &mut self,
        node: NodeId,
        id: impl Into<String>,
        predicate: Arc<dyn Condition>,
    ) -> Result<()> {
        self.node_mut(node)?.condition = Some(NodeCondition {
            id: id.into(),
            predicate,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Panics if `id` did not come from this graph.
    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TaskNode> {
        self.nodes.get(id.0)
    }

    pub fn node_by_task_id(&self, task_id: &str) -> Option<&TaskNode> {
        self.by_task_id.get(task_id).map(|id| &self.nodes[id.0])
    }

    pub fn node_by_name(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn id_of(&self, task_id: &str) -> Option<NodeId> {
        self.by_task_id.get(task_id).copied()
    }

    pub fn name_of(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    /// Nodes that list `id` among their dependencies.
    pub fn dependents_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.dependencies.contains(&id))
            .map(|n| n.id)
            .collect()
    }

    /// Nodes named as some other node's fallback.
    pub fn fallback_targets(&self) -> HashSet<NodeId> {
        self.nodes.iter().filter_map(|n| n.fallback).collect()
    }

    /// Nodes that name `id` as their fallback.
    pub fn dispatchers_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.fallback == Some(id))
            .map(|n| n.id)
            .collect()
    }

    /// Nodes with no dependencies that are not pure fallback targets: where a
    /// run starts.
    pub fn entry_points(&self) -> Vec<NodeId> {
        let fallbacks = self.fallback_targets();
        self.nodes
            .iter()
            .filter(|n| n.dependencies.is_empty() && !fallbacks.contains(&n.id))
            .map(|n| n.id)
            .collect()
    }

    /// True iff every dependency of `id` has completed.
    ///
    /// Only completion counts; dependency success is not consulted.
    pub fn is_ready(&self, id: NodeId) -> bool {
        self.nodes[id.0]
            .dependencies
            .iter()
            .all(|dep| self.nodes[dep.0].completed)
    }

    /// Run a node: check its condition, invoke its action, and on action
    /// failure run its fallback node.
    ///
    /// Callers should only run ready nodes; this is not enforced. Node-level
    /// failures are recorded on the node and never returned. The only error
    /// is [`TaskGraphError::FallbackCycle`], raised when a fallback chain
    /// leads back to a node that is already running.
    ///
    /// A node that already has an outcome is not run again.
    pub fn run(&mut self, id: NodeId) -> Result<()> {
        self.check(id)?;
        let mut chain = Vec::new();
        self.run_in_chain(id, &mut chain)
    }

    fn run_in_chain(&mut self, id: NodeId, chain: &mut Vec<NodeId>) -> Result<()> {
        if chain.contains(&id) {
            let mut names: Vec<String> = chain.iter().map(|n| self.name_of(*n).to_string()).collect();
            names.push(self.name_of(id).to_string());
            return Err(TaskGraphError::FallbackCycle(names));
        }

        let (name, action, condition) = {
            let node = &self.nodes[id.0];
            if node.success.is_some() {
                debug!(task = %node.name, outcome = %node.outcome, "already attempted; not running again");
                return Ok(());
            }
            (node.name.clone(), Arc::clone(&node.action), node.condition.clone())
        };

        if let Some(condition) = condition {
            match condition.predicate.evaluate() {
                Ok(true) => {
                    debug!(task = %name, condition = %condition.id, "condition met");
                }
                Ok(false) => {
                    info!(task = %name, condition = %condition.id, "condition not met; skipping");
                    self.nodes[id.0].mark_not_completed(NodeOutcome::Skipped);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        task = %name,
                        condition = %condition.id,
                        error = %e,
                        "condition evaluation failed; skipping"
                    );
                    self.nodes[id.0].mark_not_completed(NodeOutcome::ConditionFailed(e.to_string()));
                    return Ok(());
                }
            }
        }

        info!(task = %name, "running task");
        match action.call() {
            Ok(()) => {
                self.nodes[id.0].mark_succeeded();
                info!(task = %name, "task completed successfully");
                Ok(())
            }
            Err(e) => {
                warn!(task = %name, error = %e, "task failed");
                let node = &mut self.nodes[id.0];
                node.mark_not_completed(NodeOutcome::Failed(e.to_string()));

                let Some(fallback) = node.fallback else {
                    return Ok(());
                };
                node.fallback_dispatches += 1;

                if !self.is_ready(fallback) {
                    warn!(
                        task = %name,
                        fallback = %self.name_of(fallback),
                        "running fallback before its own dependencies completed"
                    );
                }
                info!(task = %name, fallback = %self.name_of(fallback), "running fallback");

                chain.push(id);
                let result = self.run_in_chain(fallback, chain);
                chain.pop();
                result
            }
        }
    }

    /// Scheduler-side propagation: `id` can never become ready because
    /// `dependency` ended without completing.
    pub(crate) fn mark_blocked(&mut self, id: NodeId, dependency: NodeId) {
        let dep_name = self.name_of(dependency).to_string();
        let node = &mut self.nodes[id.0];
        debug!(task = %node.name, dependency = %dep_name, "dependency cannot complete; marking blocked");
        node.mark_not_completed(NodeOutcome::Blocked(dep_name));
    }

    /// Scheduler-side settling: every node that could dispatch the fallback
    /// `id` has ended without doing so.
    pub(crate) fn mark_not_needed(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        debug!(task = %node.name, "fallback not dispatched; marking not needed");
        node.mark_not_completed(NodeOutcome::NotNeeded);
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TaskGraphError::TaskNotFound(id.to_string()))
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut TaskNode> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| TaskGraphError::TaskNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionError, NoopAction};
    use crate::condition::{predicate, ConditionError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>, fail: bool) -> Arc<dyn Action> {
        let counter = Arc::clone(counter);
        Arc::new(move || -> std::result::Result<(), ActionError> {
            counter.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(ActionError::failed("boom"))
            } else {
                Ok(())
            }
        })
    }

    #[test]
    fn readiness_tracks_dependency_completion() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", Arc::new(NoopAction)).unwrap();
        let b = g.add_node("b", "B", Arc::new(NoopAction)).unwrap();
        g.add_dependency(b, a).unwrap();

        assert!(g.is_ready(a));
        assert!(!g.is_ready(b));
        g.run(a).unwrap();
        assert!(g.is_ready(b));
    }

    #[test]
    fn failure_runs_fallback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fb_calls = Arc::new(AtomicUsize::new(0));

        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", counting(&calls, true)).unwrap();
        let fb = g.add_node("fb", "Fallback", counting(&fb_calls, false)).unwrap();
        g.set_fallback(a, fb).unwrap();

        g.run(a).unwrap();

        let node = g.node(a);
        assert!(!node.completed());
        assert_eq!(node.success(), Some(false));
        assert_eq!(node.fallback_dispatches(), 1);
        assert_eq!(fb_calls.load(Ordering::SeqCst), 1);
        assert!(g.node(fb).completed());
    }

    #[test]
    fn condition_skip_does_not_run_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fb_calls = Arc::new(AtomicUsize::new(0));

        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", counting(&calls, true)).unwrap();
        let fb = g.add_node("fb", "Fallback", counting(&fb_calls, false)).unwrap();
        g.set_fallback(a, fb).unwrap();
        g.set_condition(a, "never", predicate(|| false)).unwrap();

        g.run(a).unwrap();

        assert_eq!(g.node(a).outcome(), &NodeOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(fb_calls.load(Ordering::SeqCst), 0);
        assert_eq!(g.node(fb).success(), None);
    }

    #[test]
    fn erroring_condition_is_treated_as_false() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", counting(&calls, false)).unwrap();
        let broken: Arc<dyn Condition> =
            Arc::new(|| -> std::result::Result<bool, ConditionError> {
                Err(ConditionError("no answer".into()))
            });
        g.set_condition(a, "broken", broken).unwrap();

        g.run(a).unwrap();

        assert!(matches!(g.node(a).outcome(), NodeOutcome::ConditionFailed(_)));
        assert_eq!(g.node(a).success(), Some(false));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_cycle_is_detected_at_run_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", counting(&calls, true)).unwrap();
        let b = g.add_node("b", "B", counting(&calls, true)).unwrap();
        g.set_fallback(a, b).unwrap();
        g.set_fallback(b, a).unwrap();

        match g.run(a) {
            Err(TaskGraphError::FallbackCycle(chain)) => assert_eq!(chain, vec!["A", "B", "A"]),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut g = TaskGraph::new();
        g.add_node("a", "Same", Arc::new(NoopAction)).unwrap();
        assert!(matches!(
            g.add_node("b", "Same", Arc::new(NoopAction)),
            Err(TaskGraphError::DuplicateName { .. })
        ));
    }
}
