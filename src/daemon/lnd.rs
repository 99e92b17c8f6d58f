//! lnd: `<lnd_root>/current`, every file of a release linked into the bin dir.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::arch::go_arch;
use super::{
    DaemonDescriptor, ReconcileOptions, Reconciler, RunningState, StatusRow, expect_version,
    lock_root, or_none, rpc_version,
};
use crate::constants::LINK_NAME;
use crate::install::refresh_links;
use crate::trust::TrustStore;
use crate::version::{LND_VERSION, installed_version, resolve_latest};

static GETINFO_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+ commit=v(\S+)$").expect("static regex"));

pub(super) async fn reconcile<T: TrustStore>(
    reconciler: &Reconciler<T>,
    descriptor: &DaemonDescriptor,
    options: ReconcileOptions,
) -> Result<StatusRow> {
    let config = &reconciler.config;
    let arch = go_arch(&reconciler.machine)?;
    let root = &config.lnd_root;
    let current = root.join(LINK_NAME);

    let mut installed = installed_version(&current.join(&descriptor.name), &LND_VERSION).await?;
    let latest = resolve_latest(&reconciler.fetcher, descriptor).await?;

    if installed.as_ref() != Some(&latest.version) {
        info!(
            "Upgrading {} from {} to {}",
            descriptor.name,
            or_none(installed.as_ref()),
            latest.version
        );
        let _lock = lock_root(root).await?;

        let dir_name = descriptor.install_dir_name(&latest.label, &arch);
        let install_dir = root.join(&dir_name);
        reconciler.stage_release(descriptor, &latest, &arch, &install_dir).await?;
        expect_version(&install_dir.join(&descriptor.name), &LND_VERSION, &latest.version)
            .await?;

        reconciler.activate(root, &dir_name).await?;
        let linked = refresh_links(&current, &config.bin_dir).await?;
        debug!("{} binary links updated", linked);
        info!("lnd {} installed", latest.version);
        installed = Some(latest.version.clone());
    }

    if options.restart {
        // a locked wallet hides the running version, so it counts as stale
        let state = running_state(reconciler, descriptor).await?;
        if !state.runs(installed.as_ref()) {
            info!("Restarting {}", descriptor.name);
            reconciler.stop_if_running(descriptor).await?;
            let daemon = config.bin_dir.join(&descriptor.name);
            let pid = reconciler
                .supervisor
                .start_detached(&descriptor.name, &daemon, std::iter::empty::<&str>())
                .await?;
            debug!("{} started as pid {}", descriptor.name, pid);
        }
    }

    Ok(StatusRow {
        name: descriptor.name.clone(),
        latest: latest.version,
        installed,
        running: running_state(reconciler, descriptor).await?,
    })
}

/// State of lnd according to `lncli getinfo`.
///
/// `getinfo` also fails while the wallet is locked, so a failed call with a
/// live process means [`RunningState::Locked`].
async fn running_state<T: TrustStore>(
    reconciler: &Reconciler<T>,
    descriptor: &DaemonDescriptor,
) -> Result<RunningState> {
    let client = reconciler.client_path(descriptor);
    if let Some(version) = rpc_version(&client, "getinfo", "version", &GETINFO_VERSION).await? {
        return Ok(RunningState::Running(version));
    }
    if reconciler.supervisor.processes(&descriptor.name).is_empty() {
        Ok(RunningState::NotRunning)
    } else {
        Ok(RunningState::Locked)
    }
}
