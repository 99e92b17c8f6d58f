//! Builder for running external tools with consistent logging and timeouts
//!
//! Every subprocess nodeup runs (`gpg`, the daemons' client binaries, `--version`
//! probes, self tests) goes through [`ToolCommand`], so output capture, timeout
//! handling and debug logging behave the same everywhere.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::UpdaterError;

/// Fluent builder for an external command.
///
/// Unlike a plain [`Command`], a non-zero exit status is not an error by itself:
/// callers inspect [`ToolOutput::success`] because for several tools (`gpg -k`,
/// `lncli getinfo`) a failure status is an expected answer.
///
/// # Examples
///
/// ```rust,no_run
/// use nodeup_cli::utils::command::ToolCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let output = ToolCommand::new("gpg")
///     .args(["--batch", "-k", "01EA5486DE18A882D4C2684590C8019E36C2E964"])
///     .with_context("key lookup")
///     .execute()
///     .await?;
/// println!("key present: {}", output.success());
/// # Ok(())
/// # }
/// ```
pub struct ToolCommand {
    /// Program to execute (name looked up in PATH, or a path)
    program: PathBuf,

    /// Arguments in order
    args: Vec<OsString>,

    /// Whether to capture stdout/stderr (true) or inherit them (false)
    capture_output: bool,

    /// Maximum duration to wait for completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Optional label included in log messages
    context: Option<String>,
}

/// Captured result of a [`ToolCommand`].
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Standard output (empty when not captured)
    pub stdout: String,
    /// Standard error (empty when not captured)
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl ToolCommand {
    /// Creates a builder with output capture enabled and a 30 second timeout.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            capture_output: true,
            timeout_duration: Some(crate::constants::TOOL_COMMAND_TIMEOUT),
            context: None,
        }
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Let the child write directly to the terminal.
    pub fn inherit_stdio(mut self) -> Self {
        self.capture_output = false;
        self
    }

    /// Set a custom timeout (None for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a label that prefixes the debug log lines of this command.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run the command to completion.
    ///
    /// Fails only when the program cannot be spawned or the timeout expires.
    pub async fn execute(self) -> Result<ToolOutput> {
        let line = self.command_line();
        match &self.context {
            Some(ctx) => tracing::debug!(target: "command", "({}) Executing: {}", ctx, line),
            None => tracing::debug!(target: "command", "Executing: {}", line),
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        if self.capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result.with_context(|| format!("Failed to execute {line}"))?,
                Err(_) => {
                    tracing::warn!(
                        target: "command",
                        "Command timed out after {} seconds: {}",
                        duration.as_secs(),
                        line
                    );
                    return Err(UpdaterError::Timeout {
                        operation: line,
                        seconds: duration.as_secs(),
                    }
                    .into());
                }
            }
        } else {
            output_future.await.with_context(|| format!("Failed to execute {line}"))?
        };

        let result = ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            tracing::trace!(target: "command", "Command completed successfully");
        } else {
            tracing::debug!(target: "command", "Command exited with {:?}", result.code);
            if !result.stderr.trim().is_empty() {
                tracing::debug!(target: "command", "stderr: {}", result.stderr.trim());
            }
        }

        Ok(result)
    }
}
