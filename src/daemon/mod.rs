//! Bringing each daemon to its latest verified release.
//!
//! [`Reconciler::reconcile`] runs the whole pipeline for one daemon family:
//!
//! 1. map the machine onto the family's architecture label
//! 2. read the installed version through the `current` link and resolve the
//!    latest published release
//! 3. when they differ: lock the install root, verify the archive, extract it
//!    into a fresh versioned directory, self-test and version-check the new
//!    binaries, sync, switch `current`, refresh the bin and man links
//! 4. optionally restart a daemon that is not running the installed version
//!
//! Every step is awaited in order; daemons are processed one after another by
//! [`Reconciler::run`].

pub mod arch;
pub mod bitcoin;
pub mod descriptor;
pub mod lnd;

use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::UpdaterConfig;
use crate::constants::LINK_NAME;
use crate::core::{UpdaterError, find_updater_error};
use crate::fetch::Fetcher;
use crate::install::{InstallLock, extract_archive, switch_link, sync_filesystem};
use crate::process::Supervisor;
use crate::trust::TrustStore;
use crate::utils::ToolCommand;
use crate::verify::ArtifactVerifier;
use crate::version::{Version, installed_version, release::Release};

pub use descriptor::{DaemonDescriptor, DaemonKind};

/// What a daemon process is doing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunningState {
    /// The daemon answers RPC and reports this version.
    Running(Version),
    /// A process exists but does not answer (lnd with a locked wallet).
    Locked,
    /// A process exists but does not answer RPC yet (bitcoind loading its indexes).
    Starting,
    /// No process with the daemon's name exists.
    NotRunning,
}

impl RunningState {
    /// Whether the daemon answers and reports `version`.
    pub fn runs(&self, version: Option<&Version>) -> bool {
        matches!((self, version), (Self::Running(running), Some(v)) if running == v)
    }
}

impl fmt::Display for RunningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running(version) => write!(f, "{version}"),
            Self::Locked => f.write_str("locked"),
            Self::Starting => f.write_str("starting"),
            Self::NotRunning => f.write_str("-"),
        }
    }
}

/// Outcome of reconciling one daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    /// Daemon name (`bitcoind`, `lnd`)
    pub name: String,
    /// Latest published version
    pub latest: Version,
    /// Version behind the `current` link, if anything is installed
    pub installed: Option<Version>,
    /// State of the daemon process
    pub running: RunningState,
}

/// Switches for [`Reconciler::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Restart a daemon that is not running the installed version
    pub restart: bool,
    /// Run a release's bundled test suite before activating it
    pub run_tests: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            restart: false,
            run_tests: true,
        }
    }
}

/// Result for one daemon of a [`Reconciler::run`].
#[derive(Debug)]
pub enum DaemonOutcome {
    /// The daemon was reconciled.
    Done(StatusRow),
    /// Reconciling failed; only recorded in continue-on-error mode.
    Failed {
        /// Daemon name
        name: String,
        /// What went wrong
        error: anyhow::Error,
    },
}

/// Outcomes of all daemons of a run, in processing order.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One entry per processed daemon
    pub outcomes: Vec<DaemonOutcome>,
}

impl RunReport {
    /// Whether any daemon failed.
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|outcome| matches!(outcome, DaemonOutcome::Failed { .. }))
    }

    /// Names of the daemons that failed, in processing order.
    pub fn failed_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                DaemonOutcome::Failed { name, .. } => Some(name.as_str()),
                DaemonOutcome::Done(_) => None,
            })
            .collect()
    }
}

/// Runs the update pipeline; generic over the trust store so tests can
/// substitute the keyring.
pub struct Reconciler<T: TrustStore> {
    config: UpdaterConfig,
    fetcher: Fetcher,
    trust: T,
    supervisor: Supervisor,
    machine: String,
}

impl<T: TrustStore> Reconciler<T> {
    /// Create a reconciler for this machine. Waits end early when `cancel` fires.
    pub fn new(
        config: UpdaterConfig,
        fetcher: Fetcher,
        trust: T,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let machine = arch::machine()?;
        let supervisor = Supervisor::new(config.stop_policy(), config.start_policy(), cancel);
        Ok(Self {
            config,
            fetcher,
            trust,
            supervisor,
            machine,
        })
    }

    /// Pretend to run on `machine` (a `uname -m` value).
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = machine.into();
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// The trust store in use.
    pub fn trust(&self) -> &T {
        &self.trust
    }

    /// Bring one daemon up to date and report its status.
    pub async fn reconcile(
        &self,
        descriptor: &DaemonDescriptor,
        options: ReconcileOptions,
    ) -> Result<StatusRow> {
        match descriptor.kind {
            DaemonKind::BitcoinCore => bitcoin::reconcile(self, descriptor, options).await,
            DaemonKind::Lnd => lnd::reconcile(self, descriptor, options).await,
        }
    }

    /// Reconcile every daemon in order.
    ///
    /// By default the first failure ends the run and is returned. With
    /// `continue_on_error` a failure is recorded and the next daemon is
    /// processed, except for a failed self test or an interrupt, which always
    /// end the run.
    pub async fn run(
        &self,
        descriptors: &[DaemonDescriptor],
        options: ReconcileOptions,
        continue_on_error: bool,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        for descriptor in descriptors {
            match self.reconcile(descriptor, options).await {
                Ok(row) => report.outcomes.push(DaemonOutcome::Done(row)),
                Err(e) => {
                    let fatal = find_updater_error(&e).is_some_and(UpdaterError::aborts_run);
                    if !continue_on_error || fatal {
                        return Err(e);
                    }
                    error!("{} failed: {:#}", descriptor.name, e);
                    report.outcomes.push(DaemonOutcome::Failed {
                        name: descriptor.name.clone(),
                        error: e,
                    });
                }
            }
        }
        Ok(report)
    }

    /// Verify `release` and extract it into `install_dir`.
    ///
    /// The caller holds the install lock of the install root.
    async fn stage_release(
        &self,
        descriptor: &DaemonDescriptor,
        release: &Release,
        arch: &str,
        install_dir: &Path,
    ) -> Result<()> {
        let verifier = ArtifactVerifier::new(&self.fetcher, &self.trust, &self.config.cache_dir);
        let archive = verifier.verify(descriptor, &release.label, arch).await?;
        info!("Signature of {} {} is valid", descriptor.name, release.version);

        info!("Extracting {}", archive.display());
        extract_archive(&archive, install_dir).await
    }

    /// Make `install_root/<dir_name>` the active installation.
    async fn activate(&self, install_root: &Path, dir_name: &str) -> Result<()> {
        sync_filesystem().await?;
        let link = install_root.join(LINK_NAME);
        if switch_link(Path::new(dir_name), &link).await? {
            info!("{} now points to {}", link.display(), dir_name);
        }
        Ok(())
    }

    /// Stop the daemon if any process runs under its name.
    async fn stop_if_running(&self, descriptor: &DaemonDescriptor) -> Result<()> {
        if self.supervisor.processes(&descriptor.name).is_empty() {
            debug!("{} is not running", descriptor.name);
            return Ok(());
        }
        self.supervisor.stop(&descriptor.name, &self.client_path(descriptor)).await
    }

    fn client_path(&self, descriptor: &DaemonDescriptor) -> PathBuf {
        self.config.bin_dir.join(&descriptor.client)
    }
}

/// Take the install lock of `install_root`.
async fn lock_root(install_root: &Path) -> Result<InstallLock> {
    InstallLock::acquire(install_root)
        .await
        .with_context(|| format!("Failed to lock {}", install_root.display()))
}

/// Require `binary --version` to report `expected`.
async fn expect_version(binary: &Path, pattern: &Regex, expected: &Version) -> Result<()> {
    match installed_version(binary, pattern).await? {
        Some(found) if found == *expected => Ok(()),
        found => Err(UpdaterError::VersionMismatch {
            expected: expected.to_string(),
            found: found.map_or_else(|| "nothing".to_string(), |v| v.to_string()),
        }
        .into()),
    }
}

/// Version reported by a client RPC call, read from a string field of its
/// JSON answer.
///
/// `None` when the client is missing or the call fails (daemon down, wallet
/// locked). An answer that does not match `pattern` is a
/// [`UpdaterError::VersionParseError`].
async fn rpc_version(
    client: &Path,
    command: &str,
    field: &str,
    pattern: &Regex,
) -> Result<Option<Version>> {
    if !client.exists() {
        debug!("{} is not installed", client.display());
        return Ok(None);
    }

    let output = ToolCommand::new(client).arg(command).with_context("rpc").execute().await?;
    if !output.success() {
        return Ok(None);
    }

    let source_name = format!("{} {command}", client.display());
    let answer: serde_json::Value = serde_json::from_str(&output.stdout).map_err(|_| {
        UpdaterError::VersionParseError {
            source_name: source_name.clone(),
            output: output.stdout.trim().to_string(),
        }
    })?;
    let value = answer.get(field).and_then(serde_json::Value::as_str).ok_or_else(|| {
        UpdaterError::VersionParseError {
            source_name: source_name.clone(),
            output: output.stdout.trim().to_string(),
        }
    })?;
    Ok(Some(crate::version::capture_version(pattern, value, &source_name)?))
}

fn or_none(version: Option<&Version>) -> String {
    version.map_or_else(|| "nothing".to_string(), ToString::to_string)
}
