use std::process::Stdio;

use crate::tool::{ToolCommand, ToolError};

/// Abstraction over external tool execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ToolExecutor: Send + Sync {
    /// Run a command and capture stdout. Non-zero exit is an error.
    async fn output(&self, cmd: &ToolCommand) -> Result<Vec<u8>, ToolError>;

    /// Run a command with output going to the terminal. Non-zero exit is an error.
    async fn run(&self, cmd: &ToolCommand) -> Result<(), ToolError>;

    /// Run a command and return its exit code; only a failure to start it is
    /// an error. Termination by signal is reported as `-1`.
    async fn status(&self, cmd: &ToolCommand) -> Result<i32, ToolError>;
}

impl<E: ToolExecutor> ToolExecutor for &E {
    async fn output(&self, cmd: &ToolCommand) -> Result<Vec<u8>, ToolError> {
        (**self).output(cmd).await
    }

    async fn run(&self, cmd: &ToolCommand) -> Result<(), ToolError> {
        (**self).run(cmd).await
    }

    async fn status(&self, cmd: &ToolCommand) -> Result<i32, ToolError> {
        (**self).status(cmd).await
    }
}

/// Runs tools as child processes.
pub struct RealExecutor;

impl RealExecutor {
    fn command(cmd: &ToolCommand) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&cmd.program);
        command.args(&cmd.args);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        command
    }

    fn spawn_error(cmd: &ToolCommand, source: std::io::Error) -> ToolError {
        ToolError::Spawn {
            program: cmd.program.clone(),
            source,
        }
    }
}

impl ToolExecutor for RealExecutor {
    async fn output(&self, cmd: &ToolCommand) -> Result<Vec<u8>, ToolError> {
        tracing::debug!(command = %cmd, "running");

        let output = Self::command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Self::spawn_error(cmd, e))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(ToolError::failed(cmd, output.status.code(), stderr))
        }
    }

    async fn run(&self, cmd: &ToolCommand) -> Result<(), ToolError> {
        tracing::debug!(command = %cmd, "running");

        let status = Self::command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Self::spawn_error(cmd, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::failed(cmd, status.code(), ""))
        }
    }

    async fn status(&self, cmd: &ToolCommand) -> Result<i32, ToolError> {
        tracing::debug!(command = %cmd, "running");

        let status = Self::command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Self::spawn_error(cmd, e))?;

        // arch-lint: allow(no-silent-result-drop) reason="termination by signal has no exit code and is reported as -1"
        Ok(status.code().unwrap_or(-1))
    }
}
