// src/config/mod.rs

//! Graph definition loading and validation for taskgraph.
//!
//! Responsibilities:
//! - Define the TOML-backed definition model (`model.rs`).
//! - Load a definition file from disk or a string (`loader.rs`).
//! - Validate invariants like unique names and acyclic fallbacks (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_and_validate};
pub use model::{ConfigSection, Definition, RawDefinition, TaskDefinition};
