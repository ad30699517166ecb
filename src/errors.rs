// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only malformed definitions, fallback cycles and scheduler deadlocks are
//! surfaced here. Action and condition failures stay inside the node that
//! produced them and show up in its outcome instead.

use thiserror::Error;

use crate::dag::Deadlock;

#[derive(Error, Debug)]
pub enum TaskGraphError {
    #[error("Definition error: {0}")]
    DefinitionError(String),

    #[error("Unknown task reference '{reference}' in `{field}` of task '{task}'")]
    UnknownReference {
        task: String,
        field: &'static str,
        reference: String,
    },

    #[error("Duplicate task name '{name}' (task ids '{first}' and '{second}')")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    #[error("Task '{task}' is named '{name}', which is the condition gate id of task '{gated}'")]
    GateIdTaken {
        name: String,
        task: String,
        gated: String,
    },

    #[error("Fallback cycle detected: {}", .0.join(" -> "))]
    FallbackCycle(Vec<String>),

    #[error("{0}")]
    Deadlock(Deadlock),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaskGraphError>;
