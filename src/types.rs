use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What the graph builder does with an `after` or `fallback` entry that names
/// a task id absent from the definition.
///
/// - `Error`: reject the definition with
///   [`TaskGraphError::UnknownReference`](crate::errors::TaskGraphError::UnknownReference)
///   (default).
/// - `Drop`: log a warning and silently discard the reference, leaving the
///   rest of the task intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownReferencePolicy {
    #[default]
    Error,
    Drop,
}

impl FromStr for UnknownReferencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(UnknownReferencePolicy::Error),
            "drop" => Ok(UnknownReferencePolicy::Drop),
            other => Err(format!(
                "invalid unknown_references: {other} (expected \"error\" or \"drop\")"
            )),
        }
    }
}

impl fmt::Display for UnknownReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReferencePolicy::Error => write!(f, "error"),
            UnknownReferencePolicy::Drop => write!(f, "drop"),
        }
    }
}

/// Output format for `--export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Node/edge lists as pretty-printed JSON.
    Json,
    /// Graphviz DOT source.
    Dot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_case_insensitively() {
        assert_eq!(
            " DROP ".parse::<UnknownReferencePolicy>(),
            Ok(UnknownReferencePolicy::Drop)
        );
        assert_eq!(
            "error".parse::<UnknownReferencePolicy>(),
            Ok(UnknownReferencePolicy::Error)
        );
        assert!("lenient".parse::<UnknownReferencePolicy>().is_err());
    }
}
