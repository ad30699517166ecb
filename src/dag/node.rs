// src/dag/node.rs

//! Task nodes and their outcome state.

use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::condition::Condition;

/// Stable index of a node inside its [`TaskGraph`](crate::dag::TaskGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a node's most recent attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Not attempted yet.
    NotRun,
    /// Action returned normally.
    Succeeded,
    /// Condition evaluated to false; the action was not invoked.
    Skipped,
    /// Condition predicate errored; handled like [`NodeOutcome::Skipped`].
    ConditionFailed(String),
    /// Action failed with the given message.
    Failed(String),
    /// Never runnable: the named dependency ended without completing.
    Blocked(String),
    /// Fallback-only node whose dispatchers all ended without failing over
    /// to it.
    NotNeeded,
}

impl NodeOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeOutcome::NotRun)
    }
}

impl fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOutcome::NotRun => write!(f, "not run"),
            NodeOutcome::Succeeded => write!(f, "succeeded"),
            NodeOutcome::Skipped => write!(f, "skipped (condition false)"),
            NodeOutcome::ConditionFailed(e) => write!(f, "skipped ({e})"),
            NodeOutcome::Failed(e) => write!(f, "failed: {e}"),
            NodeOutcome::Blocked(dep) => write!(f, "blocked by '{dep}'"),
            NodeOutcome::NotNeeded => write!(f, "not needed"),
        }
    }
}

/// A condition bound to a node, keeping its identifier for logs and exports.
#[derive(Clone)]
pub struct NodeCondition {
    pub id: String,
    pub predicate: Arc<dyn Condition>,
}

impl fmt::Debug for NodeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCondition").field("id", &self.id).finish()
    }
}

/// A vertex of the task graph.
///
/// Dependencies and the fallback are [`NodeId`]s into the owning graph, so
/// nodes share sub-graphs without owning each other. Outcome fields are
/// written only by the graph's `run` for this node, or by the scheduler when
/// it marks the node blocked or not needed.
pub struct TaskNode {
    pub(crate) id: NodeId,
    pub(crate) task_id: String,
    pub(crate) name: String,
    pub(crate) action: Arc<dyn Action>,
    pub(crate) dependencies: Vec<NodeId>,
    pub(crate) condition: Option<NodeCondition>,
    pub(crate) fallback: Option<NodeId>,

    pub(crate) completed: bool,
    pub(crate) success: Option<bool>,
    pub(crate) outcome: NodeOutcome,
    /// How many times this node's failure dispatched its fallback.
    pub(crate) fallback_dispatches: usize,
}

impl TaskNode {
    pub(crate) fn new(id: NodeId, task_id: String, name: String, action: Arc<dyn Action>) -> Self {
        Self {
            id,
            task_id,
            name,
            action,
            dependencies: Vec::new(),
            condition: None,
            fallback: None,
            completed: false,
            success: None,
            outcome: NodeOutcome::NotRun,
            fallback_dispatches: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Key of this task in the definition.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn condition(&self) -> Option<&NodeCondition> {
        self.condition.as_ref()
    }

    pub fn fallback(&self) -> Option<NodeId> {
        self.fallback
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// `None` until the node has been attempted.
    pub fn success(&self) -> Option<bool> {
        self.success
    }

    pub fn outcome(&self) -> &NodeOutcome {
        &self.outcome
    }

    pub fn fallback_dispatches(&self) -> usize {
        self.fallback_dispatches
    }

    /// Attempted and ended without completing.
    pub fn is_failed_terminal(&self) -> bool {
        self.success == Some(false)
    }

    pub(crate) fn mark_succeeded(&mut self) {
        self.completed = true;
        self.success = Some(true);
        self.outcome = NodeOutcome::Succeeded;
    }

    pub(crate) fn mark_not_completed(&mut self, outcome: NodeOutcome) {
        self.completed = false;
        self.success = Some(false);
        self.outcome = outcome;
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("task_id", &self.task_id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("condition", &self.condition)
            .field("fallback", &self.fallback)
            .field("completed", &self.completed)
            .field("success", &self.success)
            .field("outcome", &self.outcome)
            .finish()
    }
}
