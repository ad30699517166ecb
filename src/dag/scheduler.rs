use std::collections::HashSet;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::node::NodeId;
use crate::dag::scheduler_step::{Deadlock, RunReport, WaveStep};
use crate::errors::{Result, TaskGraphError};

/// Scheduler owns a [`TaskGraph`] for the duration of a run and drives it in
/// waves.
///
/// Each wave runs every pending node whose dependencies have all completed.
/// It is responsible for:
/// - deciding which nodes take part in waves (fallback targets don't; they
///   only run when a failing node dispatches them)
/// - running ready nodes in dependency order
/// - settling fallback targets nobody dispatched as not needed
/// - marking nodes blocked when a dependency ended without completing
/// - reporting a deadlock when pending nodes remain but none are ready
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    /// Nodes scheduled through waves, in graph order.
    members: Vec<NodeId>,
    /// Nodes only reachable through fallback dispatch, in graph order.
    fallbacks: Vec<NodeId>,
    waves: Vec<Vec<String>>,
}

impl Scheduler {
    pub fn new(graph: TaskGraph) -> Self {
        let targets = graph.fallback_targets();
        let (fallbacks, members): (Vec<NodeId>, Vec<NodeId>) =
            graph.node_ids().partition(|id| targets.contains(id));

        Self {
            graph,
            members,
            fallbacks,
            waves: Vec::new(),
        }
    }

    /// Read-only view of the graph, valid at any point of the run.
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn into_graph(self) -> TaskGraph {
        self.graph
    }

    /// Wave members not yet attempted.
    pub fn pending(&self) -> Vec<NodeId> {
        self.members
            .iter()
            .copied()
            .filter(|id| self.graph.node(*id).success().is_none())
            .collect()
    }

    /// Pending nodes whose dependencies have all completed.
    pub fn ready(&self) -> Vec<NodeId> {
        self.pending()
            .into_iter()
            .filter(|id| self.graph.is_ready(*id))
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn waves_completed(&self) -> usize {
        self.waves.len()
    }

    /// Run one wave.
    ///
    /// Returns [`TaskGraphError::Deadlock`] if nodes are pending but none is
    /// ready, and propagates [`TaskGraphError::FallbackCycle`] from node runs.
    pub fn step(&mut self) -> Result<WaveStep> {
        if self.is_finished() {
            return Ok(WaveStep {
                run_finished: true,
                ..WaveStep::default()
            });
        }

        let ready = self.ready();
        if ready.is_empty() {
            let deadlock = self.deadlock();
            warn!(stuck = ?deadlock.stuck, cycles = ?deadlock.cycles, "scheduler: deadlock detected");
            return Err(TaskGraphError::Deadlock(deadlock));
        }

        let wave = self.waves.len() + 1;
        debug!(wave, ready = ready.len(), "scheduler: starting wave");

        let completed_before: HashSet<NodeId> = self
            .graph
            .nodes()
            .filter(|n| n.completed())
            .map(|n| n.id())
            .collect();

        let mut step = WaveStep::default();
        for id in ready {
            self.graph.run(id)?;
            let node = self.graph.node(id);
            step.ran.push(node.name().to_string());
            if node.is_failed_terminal() {
                step.newly_failed.push(node.name().to_string());
            }
        }

        step.newly_completed = self
            .graph
            .nodes()
            .filter(|n| n.completed() && !completed_before.contains(&n.id()))
            .map(|n| n.name().to_string())
            .collect();
        let (not_needed, blocked) = self.settle();
        step.not_needed = not_needed;
        step.newly_blocked = blocked;
        step.run_finished = self.is_finished();

        info!(
            wave,
            ran = ?step.ran,
            failed = ?step.newly_failed,
            blocked = ?step.newly_blocked,
            not_needed = ?step.not_needed,
            "scheduler: wave finished"
        );
        self.waves.push(step.ran.clone());

        Ok(step)
    }

    /// Run waves until every wave member has an outcome.
    ///
    /// For an acyclic graph this takes at most one wave per node.
    pub fn run(&mut self) -> Result<RunReport> {
        info!(
            tasks = self.graph.len(),
            entry_points = self.graph.entry_points().len(),
            "scheduler: starting run"
        );

        loop {
            let step = self.step()?;
            if step.run_finished {
                break;
            }
        }

        let report = self.report();
        info!(
            waves = report.waves.len(),
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            "scheduler: run finished"
        );
        Ok(report)
    }

    /// Snapshot of the waves so far and every node's current outcome.
    pub fn report(&self) -> RunReport {
        RunReport {
            waves: self.waves.clone(),
            outcomes: self
                .graph
                .nodes()
                .map(|n| (n.name().to_string(), n.outcome().clone()))
                .collect(),
        }
    }

    /// Give a terminal outcome to nodes that can no longer run:
    ///
    /// - fallback targets whose dispatchers have all ended without failing
    ///   over to them become not needed,
    /// - pending nodes with a dependency that ended without completing
    ///   become blocked.
    ///
    /// Repeats until nothing changes, since each kind can enable the other.
    /// Returns the names of newly not-needed and newly blocked nodes.
    fn settle(&mut self) -> (Vec<String>, Vec<String>) {
        let mut not_needed = Vec::new();
        let mut blocked = Vec::new();

        loop {
            let unused: Vec<NodeId> = self
                .fallbacks
                .iter()
                .copied()
                .filter(|id| self.graph.node(*id).success().is_none())
                .filter(|id| {
                    self.graph
                        .dispatchers_of(*id)
                        .iter()
                        .all(|d| self.graph.node(*d).success().is_some())
                })
                .collect();

            let newly_blocked: Vec<(NodeId, NodeId)> = self
                .pending()
                .into_iter()
                .filter_map(|id| {
                    self.graph
                        .node(id)
                        .dependencies()
                        .iter()
                        .find(|dep| self.graph.node(**dep).is_failed_terminal())
                        .map(|dep| (id, *dep))
                })
                .collect();

            if unused.is_empty() && newly_blocked.is_empty() {
                return (not_needed, blocked);
            }
            for id in unused {
                self.graph.mark_not_needed(id);
                not_needed.push(self.graph.name_of(id).to_string());
            }
            for (id, dep) in newly_blocked {
                self.graph.mark_blocked(id, dep);
                blocked.push(self.graph.name_of(id).to_string());
            }
        }
    }

    fn deadlock(&self) -> Deadlock {
        let pending = self.pending();
        let stuck_set: HashSet<NodeId> = pending.iter().copied().collect();

        // Edge direction: dep -> node, restricted to stuck nodes.
        let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for id in pending.iter() {
            graph.add_node(*id);
            for dep in self.graph.node(*id).dependencies() {
                if stuck_set.contains(dep) {
                    graph.add_edge(*dep, *id, ());
                }
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<String> = scc
                    .into_iter()
                    .map(|id| self.graph.name_of(id).to_string())
                    .collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();

        let mut stuck: Vec<String> = pending
            .iter()
            .map(|id| self.graph.name_of(*id).to_string())
            .collect();
        stuck.sort();

        Deadlock {
            stuck,
            cycles,
            waves_completed: self.waves.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionError, NoopAction};
    use crate::dag::node::NodeOutcome;
    use std::sync::Arc;

    fn failing() -> Arc<dyn crate::action::Action> {
        Arc::new(|| -> std::result::Result<(), ActionError> { Err(ActionError::failed("nope")) })
    }

    #[test]
    fn chain_runs_one_node_per_wave() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", Arc::new(NoopAction)).unwrap();
        let b = g.add_node("b", "B", Arc::new(NoopAction)).unwrap();
        let c = g.add_node("c", "C", Arc::new(NoopAction)).unwrap();
        g.add_dependency(b, a).unwrap();
        g.add_dependency(c, b).unwrap();

        let mut scheduler = Scheduler::new(g);
        let report = scheduler.run().unwrap();

        assert_eq!(report.waves, vec![vec!["A"], vec!["B"], vec!["C"]]);
        assert!(report.all_ok());
    }

    #[test]
    fn failure_blocks_dependents_transitively() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", failing()).unwrap();
        let b = g.add_node("b", "B", Arc::new(NoopAction)).unwrap();
        let c = g.add_node("c", "C", Arc::new(NoopAction)).unwrap();
        g.add_dependency(b, a).unwrap();
        g.add_dependency(c, b).unwrap();

        let mut scheduler = Scheduler::new(g);
        let step = scheduler.step().unwrap();
        assert_eq!(step.newly_failed, vec!["A"]);
        assert_eq!(step.newly_blocked, vec!["B", "C"]);
        assert!(step.run_finished);

        let graph = scheduler.graph();
        assert_eq!(graph.node(c).outcome(), &NodeOutcome::Blocked("B".into()));
        assert_eq!(graph.node(c).success(), Some(false));
    }

    #[test]
    fn fallback_targets_are_not_wave_members() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", Arc::new(NoopAction)).unwrap();
        let fb = g.add_node("fb", "Fallback", Arc::new(NoopAction)).unwrap();
        g.set_fallback(a, fb).unwrap();

        let mut scheduler = Scheduler::new(g);
        let report = scheduler.run().unwrap();

        assert_eq!(report.waves, vec![vec!["A"]]);
        assert_eq!(report.outcome("Fallback"), Some(&NodeOutcome::NotNeeded));
        let fallback = scheduler.graph().node(fb);
        assert!(!fallback.completed());
        assert_eq!(fallback.success(), Some(false));
    }

    #[test]
    fn unused_fallback_blocks_its_dependents() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", Arc::new(NoopAction)).unwrap();
        let fb = g.add_node("fb", "Fallback", Arc::new(NoopAction)).unwrap();
        let c = g.add_node("c", "C", Arc::new(NoopAction)).unwrap();
        g.set_fallback(a, fb).unwrap();
        g.add_dependency(c, fb).unwrap();

        let mut scheduler = Scheduler::new(g);
        let step = scheduler.step().unwrap();
        assert_eq!(step.not_needed, vec!["Fallback"]);
        assert_eq!(step.newly_blocked, vec!["C"]);
        assert!(step.run_finished);

        let graph = scheduler.graph();
        assert_eq!(graph.node(c).outcome(), &NodeOutcome::Blocked("Fallback".into()));
    }

    #[test]
    fn dispatched_fallback_unblocks_its_dependents() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", failing()).unwrap();
        let fb = g.add_node("fb", "Fallback", Arc::new(NoopAction)).unwrap();
        let c = g.add_node("c", "C", Arc::new(NoopAction)).unwrap();
        g.set_fallback(a, fb).unwrap();
        g.add_dependency(c, fb).unwrap();

        let report = Scheduler::new(g).run().unwrap();

        assert_eq!(report.waves, vec![vec!["A"], vec!["C"]]);
        assert_eq!(report.outcome("Fallback"), Some(&NodeOutcome::Succeeded));
        assert_eq!(report.outcome("C"), Some(&NodeOutcome::Succeeded));
    }

    #[test]
    fn fallback_chain_settles_transitively() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", Arc::new(NoopAction)).unwrap();
        let fb1 = g.add_node("fb1", "Fallback1", Arc::new(NoopAction)).unwrap();
        let fb2 = g.add_node("fb2", "Fallback2", Arc::new(NoopAction)).unwrap();
        g.set_fallback(a, fb1).unwrap();
        g.set_fallback(fb1, fb2).unwrap();

        let report = Scheduler::new(g).run().unwrap();

        assert_eq!(report.outcome("Fallback1"), Some(&NodeOutcome::NotNeeded));
        assert_eq!(report.outcome("Fallback2"), Some(&NodeOutcome::NotNeeded));
    }

    #[test]
    fn self_dependency_deadlocks() {
        let mut g = TaskGraph::new();
        let a = g.add_node("a", "A", Arc::new(NoopAction)).unwrap();
        g.add_dependency(a, a).unwrap();

        match Scheduler::new(g).run() {
            Err(TaskGraphError::Deadlock(d)) => {
                assert_eq!(d.stuck, vec!["A"]);
                assert_eq!(d.cycles, vec![vec!["A".to_string()]]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
