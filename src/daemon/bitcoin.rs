//! Bitcoin Core: `<bitcoin_root>/<gcc-arch>/current`, self test, man pages.

use anyhow::Result;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::arch::gcc_arch;
use super::{
    DaemonDescriptor, ReconcileOptions, Reconciler, RunningState, StatusRow, expect_version,
    lock_root, or_none, rpc_version,
};
use crate::constants::LINK_NAME;
use crate::core::UpdaterError;
use crate::install::refresh_links;
use crate::trust::TrustStore;
use crate::utils::ToolCommand;
use crate::version::{BITCOIN_CLI_VERSION, BITCOIND_VERSION, installed_version, resolve_latest};

static SUBVERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/Satoshi:(.*)/").expect("static regex"));

const TEST_BINARY: &str = "test_bitcoin";
const MAN_SUBDIR: &str = "share/man/man1";

pub(super) async fn reconcile<T: TrustStore>(
    reconciler: &Reconciler<T>,
    descriptor: &DaemonDescriptor,
    options: ReconcileOptions,
) -> Result<StatusRow> {
    let config = &reconciler.config;
    let arch = gcc_arch(&reconciler.machine);
    let arch_root = config.bitcoin_root.join(&arch);
    let current = arch_root.join(LINK_NAME);

    let mut installed =
        installed_version(&current.join("bin").join(&descriptor.name), &BITCOIND_VERSION).await?;
    let latest = resolve_latest(&reconciler.fetcher, descriptor).await?;

    if installed.as_ref() != Some(&latest.version) {
        info!(
            "Upgrading {} from {} to {}",
            descriptor.name,
            or_none(installed.as_ref()),
            latest.version
        );
        let _lock = lock_root(&arch_root).await?;

        let dir_name = descriptor.install_dir_name(&latest.label, &arch);
        let install_dir = arch_root.join(&dir_name);
        reconciler.stage_release(descriptor, &latest, &arch, &install_dir).await?;

        let bin = install_dir.join("bin");
        if options.run_tests {
            run_self_test(&bin.join(TEST_BINARY)).await?;
        }
        expect_version(&bin.join(&descriptor.name), &BITCOIND_VERSION, &latest.version).await?;
        expect_version(&bin.join(&descriptor.client), &BITCOIN_CLI_VERSION, &latest.version)
            .await?;

        reconciler.activate(&arch_root, &dir_name).await?;
        let linked = refresh_links(&current.join("bin"), &config.bin_dir).await?;
        debug!("{} binary links updated", linked);
        let man = current.join(MAN_SUBDIR);
        if man.is_dir() {
            refresh_links(&man, &config.man_dir).await?;
        }
        info!("Bitcoin Core {} installed", latest.version);
        installed = Some(latest.version.clone());
    }

    let running = if options.restart {
        let state = running_state(reconciler, descriptor, true).await?;
        if state.runs(installed.as_ref()) {
            state
        } else {
            info!("Restarting {}", descriptor.name);
            reconciler.stop_if_running(descriptor).await?;
            let daemon = config.bin_dir.join(&descriptor.name);
            reconciler.supervisor.start_forking(&descriptor.name, &daemon, ["-daemon"]).await?;
            running_state(reconciler, descriptor, true).await?
        }
    } else {
        running_state(reconciler, descriptor, false).await?
    };

    Ok(StatusRow {
        name: descriptor.name.clone(),
        latest: latest.version,
        installed,
        running,
    })
}

/// Version the running daemon reports through `getnetworkinfo`.
///
/// A freshly started bitcoind refuses RPC while it loads its indexes. With
/// `wait`, the call is repeated for as long as a process exists, within the
/// start policy; without it a single unanswered call means
/// [`RunningState::Starting`].
async fn running_state<T: TrustStore>(
    reconciler: &Reconciler<T>,
    descriptor: &DaemonDescriptor,
    wait: bool,
) -> Result<RunningState> {
    let supervisor = &reconciler.supervisor;
    let name = descriptor.name.as_str();
    let client = reconciler.client_path(descriptor);
    let client = client.as_path();

    if !wait {
        if supervisor.processes(name).is_empty() {
            return Ok(RunningState::NotRunning);
        }
        let version = rpc_version(client, "getnetworkinfo", "subversion", &SUBVERSION).await?;
        return Ok(version.map_or(RunningState::Starting, RunningState::Running));
    }

    supervisor
        .start_policy()
        .until(&format!("{name} to answer RPC"), supervisor.cancel_token(), move || async move {
            if supervisor.processes(name).is_empty() {
                return Ok(Some(RunningState::NotRunning));
            }
            let version = rpc_version(client, "getnetworkinfo", "subversion", &SUBVERSION).await?;
            Ok::<_, anyhow::Error>(version.map(RunningState::Running))
        })
        .await
}

/// Run a release's bundled unit tests, showing their output.
async fn run_self_test(binary: &Path) -> Result<()> {
    if !binary.is_file() {
        warn!("{} not found, skipping the self test", binary.display());
        return Ok(());
    }

    info!("Running {}", binary.display());
    let output = ToolCommand::new(binary)
        .inherit_stdio()
        .with_timeout(None)
        .with_context("self test")
        .execute()
        .await?;
    match output.code {
        Some(0) => Ok(()),
        // None: killed by a signal
        code => Err(UpdaterError::SelfTestFailed {
            code: code.unwrap_or(1),
        }
        .into()),
    }
}
