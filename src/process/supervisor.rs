//! Stopping and starting daemons.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PollPolicy, ProcessSet, comm_name, find_processes, live_comm};
use crate::core::UpdaterError;
use crate::utils::ToolCommand;

/// Process lifecycle operations with bounded waits.
#[derive(Debug, Clone)]
pub struct Supervisor {
    stop_policy: PollPolicy,
    start_policy: PollPolicy,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor whose waits end early when `cancel` fires.
    pub fn new(
        stop_policy: PollPolicy,
        start_policy: PollPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stop_policy,
            start_policy,
            cancel,
        }
    }

    /// Processes currently running as `name`.
    pub fn processes(&self, name: &str) -> ProcessSet {
        find_processes(name)
    }

    /// The token that interrupts this supervisor's waits.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Policy for waits on a starting daemon (RPC warm-up, exec confirmation).
    pub fn start_policy(&self) -> PollPolicy {
        self.start_policy
    }

    /// Stop every process named `name`.
    ///
    /// Asks politely with `<client> stop` first; if that fails, every matching
    /// process gets SIGTERM. Then waits until none is left.
    pub async fn stop(&self, name: &str, client: &Path) -> Result<()> {
        info!("Stopping {}", name);
        let request = ToolCommand::new(client).arg("stop").with_context("stop").execute().await;
        let stopped = match request {
            Ok(output) => output.success(),
            Err(e) => {
                warn!("{} stop failed: {:#}", client.display(), e);
                false
            }
        };

        if !stopped {
            for pid in self.processes(name).iter() {
                debug!("Sending SIGTERM to {} ({})", name, pid);
                match kill(Pid::from_raw(pid), Signal::SIGTERM) {
                    Ok(()) | Err(Errno::ESRCH) => {}
                    Err(e) => {
                        return Err(UpdaterError::ProcessError {
                            operation: format!("signal {name}"),
                            reason: e.to_string(),
                        }
                        .into());
                    }
                }
            }
        }

        self.stop_policy
            .until(&format!("{name} to exit"), &self.cancel, || {
                let gone = self.processes(name).is_empty();
                async move { Ok(gone.then_some(())) }
            })
            .await
    }

    /// Start `program` as a background process named `name`.
    ///
    /// Standard streams go to `/dev/null` and the process gets its own process
    /// group, so it survives nodeup and ignores its terminal's Ctrl-C. Succeeds
    /// once the kernel reports the spawned PID under the expected name.
    pub async fn start_detached<I, S>(&self, name: &str, program: &Path, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        info!("Starting {}", name);
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .with_context(|| format!("Failed to start {}", program.display()))?;
        let pid = child.id().and_then(|id| i32::try_from(id).ok()).ok_or_else(|| {
            UpdaterError::ProcessError {
                operation: format!("start {name}"),
                reason: "the process exited immediately".to_string(),
            }
        })?;
        // the child keeps running after its handle is dropped
        drop(child);

        let expected = comm_name(name);
        self.start_policy
            .until(&format!("{name} to start"), &self.cancel, move || async move {
                match live_comm(pid) {
                    Some(comm) if comm == expected => Ok(Some(pid)),
                    Some(_) => Ok(None),
                    None => Err(anyhow::Error::from(UpdaterError::ProcessError {
                        operation: format!("start {name}"),
                        reason: "the process exited immediately".to_string(),
                    })),
                }
            })
            .await
    }

    /// Run a self-daemonizing `program` (such as `bitcoind -daemon`) to
    /// completion and require a zero exit status.
    pub async fn start_forking<I, S>(&self, name: &str, program: &Path, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString>,
    {
        info!("Starting {}", name);
        let output = ToolCommand::new(program)
            .args(args)
            .with_timeout(Some(self.start_policy.timeout))
            .with_context("start")
            .execute()
            .await?;
        if !output.success() {
            return Err(UpdaterError::ProcessError {
                operation: format!("start {name}"),
                reason: format!(
                    "exited with {}: {}",
                    output.code.map_or_else(|| "a signal".to_string(), |code| code.to_string()),
                    output.stderr.trim()
                ),
            }
            .into());
        }
        Ok(())
    }
}
