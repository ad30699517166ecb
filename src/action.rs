// src/action.rs

//! The work a task performs.
//!
//! An [`Action`] is a zero-argument capability that either returns normally
//! or fails with an [`ActionError`]. Failures never escape the node that owns
//! the action: the node records them in its outcome and dispatches its
//! fallback, if any.
//!
//! - [`NoopAction`] is the placeholder used for tasks that have neither a
//!   `cmd` nor a programmatically bound action.
//! - [`CommandAction`] runs a shell command and fails on non-zero exit.
//! - Any `Fn() -> Result<(), ActionError>` closure is an action as well.

use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error("failed to spawn `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{cmd}` exited with code {code}")]
    ExitCode { cmd: String, code: i32 },
}

impl ActionError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ActionError::Failed(msg.into())
    }
}

/// Capability invoked to perform a task's work.
pub trait Action: Send + Sync {
    fn call(&self) -> Result<(), ActionError>;
}

impl<F> Action for F
where
    F: Fn() -> Result<(), ActionError> + Send + Sync,
{
    fn call(&self) -> Result<(), ActionError> {
        self()
    }
}

/// Placeholder action; always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAction;

impl Action for NoopAction {
    fn call(&self) -> Result<(), ActionError> {
        debug!("placeholder action; nothing to do");
        Ok(())
    }
}

/// Runs a command through the platform shell (`sh -c` / `cmd /C`).
///
/// The child's stdout is inherited so task output reaches the terminal
/// directly; stderr is captured and forwarded to the log at debug level.
#[derive(Debug, Clone)]
pub struct CommandAction {
    cmd: String,
}

impl CommandAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn shell_command(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }
}

impl Action for CommandAction {
    fn call(&self) -> Result<(), ActionError> {
        info!(cmd = %self.cmd, "starting command");

        let output = self
            .shell_command()
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ActionError::Spawn {
                cmd: self.cmd.clone(),
                source,
            })?;

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(cmd = %self.cmd, "stderr: {}", line);
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(ActionError::ExitCode {
                cmd: self.cmd.clone(),
                code: output.status.code().unwrap_or(-1),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_actions() {
        let ok = || -> Result<(), ActionError> { Ok(()) };
        let bad = || -> Result<(), ActionError> { Err(ActionError::failed("boom")) };
        assert!(ok.call().is_ok());
        assert_eq!(bad.call().unwrap_err().to_string(), "boom");
    }

    #[cfg(unix)]
    #[test]
    fn command_exit_status_maps_to_result() {
        assert!(CommandAction::new("true").call().is_ok());

        match CommandAction::new("exit 3").call() {
            Err(ActionError::ExitCode { code, .. }) => assert_eq!(code, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
