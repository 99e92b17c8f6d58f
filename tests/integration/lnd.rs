//! lnd reconciliation: detached manifest signatures, restarts and the locked wallet.

use std::path::PathBuf;

use nodeup_cli::core::UpdaterError;
use nodeup_cli::daemon::{ReconcileOptions, RunningState};
use nodeup_cli::test_utils::{FakeTrustStore, TarballBuilder, VerifyPolicy};
use nodeup_cli::version::Version;

use crate::common::{
    GO_ARCH, Sleeper, TestNode, foreground_daemon, kill_groups, lnd_archive, lnd_line,
    version_script,
};

const TAG: &str = "v0.17.0-beta";
const VERSION: &str = "0.17.0-beta";

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

fn restart() -> ReconcileOptions {
    ReconcileOptions {
        restart: true,
        run_tests: true,
    }
}

#[tokio::test]
async fn test_fresh_install_from_detached_signature() {
    let node = TestNode::new().await.unwrap();
    let name = "nodeup-it-lnd0";
    node.lnd_latest(TAG);
    node.publish_lnd(TAG, lnd_archive(name, TAG, VERSION).unwrap());

    let descriptor = node.lnd(name);
    let trust = FakeTrustStore::new(VerifyPolicy::Accept).with_key(&descriptor.key_id);
    let reconciler = node.reconciler(trust).unwrap();
    let row = reconciler.reconcile(&descriptor, ReconcileOptions::default()).await.unwrap();

    assert_eq!(row.name, name);
    assert_eq!(row.latest, v(VERSION));
    assert_eq!(row.installed, Some(v(VERSION)));
    assert_eq!(row.running, RunningState::NotRunning);

    let dir_name = format!("lnd-linux-{GO_ARCH}-{TAG}");
    assert_eq!(node.lnd_current(), Some(PathBuf::from(&dir_name)));
    let current = node.config.lnd_root.join("current");
    for binary in [name, "lncli"] {
        let link = std::fs::read_link(node.config.bin_dir.join(binary)).unwrap();
        assert_eq!(link, current.join(binary));
    }

    let calls = reconciler.trust().calls();
    assert!(calls.iter().any(|call| call.starts_with("verify ") && call.ends_with(".sig")));
    assert_eq!(node.downloads_of(&format!("{dir_name}.tar.gz")), 1);
}

#[tokio::test]
async fn test_running_version_is_reported() {
    let node = TestNode::new().await.unwrap();
    let name = "nodeup-it-lnd1";
    node.install_lnd(name, TAG, &version_script(&lnd_line(VERSION))).unwrap();
    node.lnd_latest(TAG);
    node.client(
        "lncli",
        r#"echo '{"version": "0.16.4-beta commit=v0.16.4-beta", "synced_to_chain": true}'"#,
    )
    .unwrap();

    let reconciler = node.reconciler(FakeTrustStore::new(VerifyPolicy::Reject)).unwrap();
    let row = reconciler.reconcile(&node.lnd(name), ReconcileOptions::default()).await.unwrap();

    assert_eq!(row.installed, Some(v(VERSION)));
    assert_eq!(row.running, RunningState::Running(v("0.16.4-beta")));
    // up to date, nothing to verify
    assert!(reconciler.trust().calls().is_empty());
}

#[tokio::test]
async fn test_locked_daemon_is_restarted() {
    let node = TestNode::new().await.unwrap();
    let name = "nodeup-it-lnd2";
    let daemon = foreground_daemon(&lnd_line(VERSION));
    node.install_lnd(name, TAG, &daemon).unwrap();
    node.client(name, &daemon).unwrap();
    node.lnd_latest(TAG);
    node.client("lncli", "echo 'wallet locked' >&2; exit 1").unwrap();
    let old = Sleeper::spawn(&node, name).await;

    let reconciler = node.reconciler(FakeTrustStore::new(VerifyPolicy::Accept)).unwrap();
    let row = reconciler.reconcile(&node.lnd(name), restart()).await;
    let pids = kill_groups(name);

    // a locked wallet hides the version, so the process counts as outdated
    let row = row.unwrap();
    assert_eq!(row.running, RunningState::Locked);
    assert_eq!(pids.len(), 1);
    assert!(!pids.contains(&old.pid()));
}

#[tokio::test]
async fn test_restart_stops_outdated_daemon_through_its_client() {
    let node = TestNode::new().await.unwrap();
    let name = "nodeup-it-lnd6";
    let daemon = foreground_daemon(&lnd_line(VERSION));
    node.install_lnd(name, TAG, &daemon).unwrap();
    node.client(name, &daemon).unwrap();
    node.lnd_latest(TAG);
    let old = Sleeper::spawn(&node, name).await;

    // `lncli stop` ends the old process; getinfo reports the new version afterwards
    let stopped = node.temp.path().join("stopped");
    let lncli = format!(
        r#"if [ "$1" = stop ]; then kill {pid}; touch '{marker}'; exit 0; fi
if [ -e '{marker}' ]; then v={VERSION}; else v=0.16.4-beta; fi
echo "{{\"version\": \"$v commit=v$v\"}}""#,
        pid = old.pid(),
        marker = stopped.display(),
    );
    node.client("lncli", &lncli).unwrap();

    let reconciler = node.reconciler(FakeTrustStore::new(VerifyPolicy::Accept)).unwrap();
    let row = reconciler.reconcile(&node.lnd(name), restart()).await;
    let pids = kill_groups(name);

    let row = row.unwrap();
    assert!(stopped.exists());
    assert_eq!(row.installed, Some(v(VERSION)));
    assert_eq!(row.running, RunningState::Running(v(VERSION)));
    assert_eq!(pids.len(), 1);
    assert!(!pids.contains(&old.pid()));
}

#[tokio::test]
async fn test_restart_starts_stopped_daemon() {
    let node = TestNode::new().await.unwrap();
    let name = "nodeup-it-lnd3";
    let daemon = foreground_daemon(&lnd_line(VERSION));
    node.lnd_latest(TAG);
    node.publish_lnd(
        TAG,
        TarballBuilder::new(&format!("lnd-linux-{GO_ARCH}-{TAG}"))
            .executable(name, &daemon)
            .executable("lncli", "exit 1")
            .build()
            .unwrap(),
    );

    let descriptor = node.lnd(name);
    let trust = FakeTrustStore::new(VerifyPolicy::Accept).with_key(&descriptor.key_id);
    let reconciler = node.reconciler(trust).unwrap();
    let row = reconciler.reconcile(&descriptor, restart()).await;

    let pids = kill_groups(name);

    let row = row.unwrap();
    assert_eq!(row.installed, Some(v(VERSION)));
    assert_eq!(row.running, RunningState::Locked);
    assert_eq!(pids.len(), 1);
}

#[tokio::test]
async fn test_unknown_architecture_fails_before_any_download() {
    let node = TestNode::new().await.unwrap();
    node.lnd_latest(TAG);

    let reconciler = node
        .reconciler(FakeTrustStore::new(VerifyPolicy::Accept))
        .unwrap()
        .with_machine("sparc64");
    let error = reconciler
        .reconcile(&node.lnd("nodeup-it-lnd4"), ReconcileOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        error.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::UnknownArchitecture { .. })
    ));
    assert!(node.server.requests().is_empty());
}

#[tokio::test]
async fn test_tampered_archive_is_not_installed() {
    let node = TestNode::new().await.unwrap();
    let name = "nodeup-it-lnd5";
    node.lnd_latest(TAG);
    node.publish_lnd(TAG, lnd_archive(name, TAG, VERSION).unwrap());
    // swap the archive after the manifest was published
    node.server.serve(
        &format!("/releases/download/{TAG}/lnd-linux-{GO_ARCH}-{TAG}.tar.gz"),
        lnd_archive(name, TAG, "0.16.4-beta").unwrap(),
    );

    let descriptor = node.lnd(name);
    let trust = FakeTrustStore::new(VerifyPolicy::Accept).with_key(&descriptor.key_id);
    let reconciler = node.reconciler(trust).unwrap();
    let error = reconciler.reconcile(&descriptor, ReconcileOptions::default()).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::VerificationFailed { .. })
    ));
    assert_eq!(node.lnd_current(), None);
}
