//! Scoped child process handle
//!
//! The builder child is spawned with `kill_on_drop`, so dropping the guard on
//! any path (error, timeout, cancellation, panic unwinding through the
//! caller) kills the process.

use crate::error::{DepImageError, DepImageResult};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

pub(crate) struct ScopedChild {
    child: Child,
    command_line: String,
}

impl ScopedChild {
    /// Spawn `command` with piped stdout/stderr and a null stdin
    pub(crate) fn spawn(mut command: Command, command_line: &str) -> DepImageResult<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Executing: {}", command_line);
        let child = command
            .spawn()
            .map_err(|e| DepImageError::build_launch(command_line, e))?;

        Ok(Self {
            child,
            command_line: command_line.to_string(),
        })
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Wait for the process to exit
    pub(crate) async fn wait(&mut self) -> DepImageResult<ExitStatus> {
        self.child
            .wait()
            .await
            .map_err(|e| DepImageError::io(format!("waiting for {}", self.command_line), e))
    }

    /// Kill the process and reap it
    pub(crate) async fn terminate(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill {}: {}", self.command_line, e);
        }
    }
}
