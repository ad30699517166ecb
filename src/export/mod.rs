// src/export/mod.rs

//! Graph export for external renderers.
//!
//! [`export`] walks the graph depth-first from a set of roots and produces an
//! [`ExportGraph`]: ordered node declarations and ordered edges of three
//! kinds:
//!
//! - `dependency`: from a dependency into the node that waits on it,
//! - `condition`: from a synthetic `<name>_cond` gate (diamond) into the
//!   gated node,
//! - `fallback`: from a node to its fallback, styled `dashed`.
//!
//! A node or edge reachable along several paths is emitted once. The walk
//! only reads structure, so it can be taken at any point of a run.
//!
//! [`dot`] renders an [`ExportGraph`] as Graphviz DOT source.

pub mod dot;

use std::collections::HashSet;

use serde::Serialize;

use crate::dag::{NodeId, TaskGraph};

pub const CONDITION_SHAPE: &str = "diamond";
pub const CONDITION_LABEL: &str = "Condition";
pub const FALLBACK_STYLE: &str = "dashed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Dependency,
    Condition,
    Fallback,
}

impl EdgeKind {
    pub fn label(self) -> &'static str {
        match self {
            EdgeKind::Dependency => "dependency",
            EdgeKind::Condition => "condition true",
            EdgeKind::Fallback => "fallback",
        }
    }

    pub fn style(self) -> Option<&'static str> {
        match self {
            EdgeKind::Fallback => Some(FALLBACK_STYLE),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEdge {
    pub from: String,
    pub to: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip)]
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportGraph {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

impl ExportGraph {
    pub fn node(&self, id: &str) -> Option<&ExportNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &ExportEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn to_json(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Id of the synthetic gate node exported for a conditioned node.
pub fn condition_gate_id(name: &str) -> String {
    format!("{name}_cond")
}

/// What has been emitted so far.
#[derive(Debug, Default)]
struct Visited {
    nodes: HashSet<String>,
    edges: HashSet<(String, String, EdgeKind)>,
    /// Graph nodes whose outgoing structure has already been walked.
    expanded: HashSet<NodeId>,
}

/// Export the structure reachable from `roots`.
pub fn export(graph: &TaskGraph, roots: &[NodeId]) -> ExportGraph {
    let mut out = ExportGraph::default();
    let mut visited = Visited::default();
    for root in roots {
        visit(graph, *root, &mut visited, &mut out);
    }
    out
}

/// Export every node of the graph, in graph order.
pub fn export_all(graph: &TaskGraph) -> ExportGraph {
    let roots: Vec<NodeId> = graph.node_ids().collect();
    export(graph, &roots)
}

fn visit(graph: &TaskGraph, id: NodeId, visited: &mut Visited, out: &mut ExportGraph) {
    let node = graph.node(id);
    let name = node.name();

    declare_node(name, None, None, visited, out);

    // Also stops the walk on dependency cycles.
    if !visited.expanded.insert(id) {
        return;
    }

    for dep in node.dependencies() {
        visit(graph, *dep, visited, out);
        add_edge(graph.name_of(*dep), name, EdgeKind::Dependency, visited, out);
    }

    if node.condition().is_some() {
        let gate = condition_gate_id(name);
        declare_node(&gate, Some(CONDITION_SHAPE), Some(CONDITION_LABEL), visited, out);
        add_edge(&gate, name, EdgeKind::Condition, visited, out);
    }

    if let Some(fallback) = node.fallback() {
        visit(graph, fallback, visited, out);
        add_edge(name, graph.name_of(fallback), EdgeKind::Fallback, visited, out);
    }
}

fn declare_node(
    id: &str,
    shape: Option<&str>,
    label: Option<&str>,
    visited: &mut Visited,
    out: &mut ExportGraph,
) {
    if visited.nodes.insert(id.to_string()) {
        out.nodes.push(ExportNode {
            id: id.to_string(),
            shape: shape.map(str::to_string),
            label: label.map(str::to_string),
        });
    }
}

fn add_edge(from: &str, to: &str, kind: EdgeKind, visited: &mut Visited, out: &mut ExportGraph) {
    if visited
        .edges
        .insert((from.to_string(), to.to_string(), kind))
    {
        out.edges.push(ExportEdge {
            from: from.to_string(),
            to: to.to_string(),
            label: kind.label().to_string(),
            style: kind.style().map(str::to_string),
            kind,
        });
    }
}
