// src/dag/scheduler_step.rs

//! Result types for scheduler passes and whole runs.

use std::collections::BTreeMap;
use std::fmt;

use crate::dag::node::NodeOutcome;

/// Structured result of a single scheduler pass ("wave").
///
/// Useful for tests that want to step the graph manually and make assertions
/// about what changed.
#[derive(Debug, Clone, Default)]
pub struct WaveStep {
    /// Names of nodes run in this wave, in run order.
    pub ran: Vec<String>,
    /// Nodes (wave members or fallbacks) that completed during this wave.
    pub newly_completed: Vec<String>,
    /// Wave members that ended without completing (failed or skipped).
    pub newly_failed: Vec<String>,
    /// Pending nodes marked blocked because a dependency cannot complete.
    pub newly_blocked: Vec<String>,
    /// Fallback targets settled because no dispatcher failed over to them.
    pub not_needed: Vec<String>,
    /// No pending nodes remain after this wave.
    pub run_finished: bool,
}

/// Pending nodes remain but none can become ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deadlock {
    /// Names of every pending node, sorted.
    pub stuck: Vec<String>,
    /// Dependency cycles among the stuck nodes, each sorted by name.
    pub cycles: Vec<Vec<String>>,
    /// Waves completed before the deadlock was detected.
    pub waves_completed: usize,
}

impl fmt::Display for Deadlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deadlock after {} wave(s): no runnable tasks among [{}]",
            self.waves_completed,
            self.stuck.join(", ")
        )?;
        for cycle in &self.cycles {
            write!(f, "; cycle: {}", cycle.join(" <-> "))?;
        }
        Ok(())
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Node names run in each wave.
    pub waves: Vec<Vec<String>>,
    /// Final outcome of every node, keyed by name.
    pub outcomes: BTreeMap<String, NodeOutcome>,
}

impl RunReport {
    pub fn outcome(&self, name: &str) -> Option<&NodeOutcome> {
        self.outcomes.get(name)
    }

    pub fn names_with<F>(&self, pred: F) -> Vec<&str>
    where
        F: Fn(&NodeOutcome) -> bool,
    {
        self.outcomes
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.names_with(|o| matches!(o, NodeOutcome::Succeeded))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_with(|o| matches!(o, NodeOutcome::Failed(_)))
    }

    /// True when no node failed or was blocked. Skipped and not-needed
    /// nodes don't count against a run.
    pub fn all_ok(&self) -> bool {
        !self
            .outcomes
            .values()
            .any(|o| matches!(o, NodeOutcome::Failed(_) | NodeOutcome::Blocked(_)))
    }
}
