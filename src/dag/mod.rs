// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`node`] defines task nodes, their ids and outcomes.
//! - [`graph`] holds the node arena and the per-node `run` contract.
//! - [`builder`] turns a validated definition into a graph.
//! - [`scheduler`] drives a whole graph in waves and detects deadlock.
//! - [`scheduler_step`] defines the per-wave and per-run result types.

pub mod builder;
pub mod graph;
pub mod node;
pub mod scheduler;
pub mod scheduler_step;

pub use builder::GraphBuilder;
pub use graph::TaskGraph;
pub use node::{NodeCondition, NodeId, NodeOutcome, TaskNode};
pub use scheduler::Scheduler;
pub use scheduler_step::{Deadlock, RunReport, WaveStep};
