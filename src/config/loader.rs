// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Definition, RawDefinition};
use crate::errors::Result;

/// Load a definition file and return the raw, unvalidated [`RawDefinition`].
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawDefinition> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawDefinition = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a definition file from disk and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Definition> {
    let raw = load_from_path(&path)?;
    Definition::try_from(raw)
}

/// Parse and validate a definition held in memory.
pub fn parse_and_validate(contents: &str) -> Result<Definition> {
    let raw: RawDefinition = toml::from_str(contents)?;
    Definition::try_from(raw)
}

/// Default definition path: `TaskGraph.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("TaskGraph.toml")
}
