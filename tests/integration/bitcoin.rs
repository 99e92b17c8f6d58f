//! Bitcoin Core reconciliation against a local release server.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use nodeup_cli::core::UpdaterError;
use nodeup_cli::daemon::{ReconcileOptions, RunningState};
use nodeup_cli::test_utils::{FakeTrustStore, TarballBuilder, VerifyPolicy};
use nodeup_cli::version::Version;

use crate::common::{
    GCC_ARCH, Sleeper, TestNode, bitcoin_archive, bitcoin_cli_line, bitcoind_line,
    version_script,
};

const SKIP_RESTART: ReconcileOptions = ReconcileOptions {
    restart: false,
    run_tests: true,
};

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

fn trusted(node: &TestNode, policy: VerifyPolicy) -> FakeTrustStore {
    FakeTrustStore::new(policy).with_key(&node.bitcoin().key_id)
}

#[tokio::test]
async fn test_upgrade_to_latest_release() {
    let node = TestNode::new().await.unwrap();
    node.install_bitcoin("0.20.1").unwrap();
    node.bitcoin_index(&["0.9.0", "0.20.1", "0.21.0"]);
    node.publish_bitcoin("0.9.0", bitcoin_archive("0.9.0", 0).unwrap());
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let row = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap();

    assert_eq!(row.name, "bitcoind");
    assert_eq!(row.latest, v("0.21.0"));
    assert_eq!(row.installed, Some(v("0.21.0")));
    assert_eq!(row.running, RunningState::NotRunning);

    assert_eq!(node.bitcoin_current(), Some(PathBuf::from("bitcoin-0.21.0")));
    let arch_root = node.bitcoin_arch_root();
    assert!(arch_root.join("bitcoin-0.21.0/bin/bitcoind").is_file());
    assert!(arch_root.join("bitcoin-0.20.1/bin/bitcoind").is_file());
    assert!(arch_root.join("bitcoin-0.21.0/README.md").is_file());

    // links point through `current`, not at the versioned directory
    let bin_link = std::fs::read_link(node.config.bin_dir.join("bitcoind")).unwrap();
    assert_eq!(bin_link, arch_root.join("current/bin/bitcoind"));
    assert!(node.config.bin_dir.join("test_bitcoin").exists());
    let man_link = std::fs::read_link(node.config.man_dir.join("bitcoind.1")).unwrap();
    assert_eq!(man_link, arch_root.join("current/share/man/man1/bitcoind.1"));

    let cached = node.config.cache_dir.join(format!("bitcoin-0.21.0-{GCC_ARCH}.tar.gz"));
    assert!(cached.is_file());
    assert!(node.config.cache_dir.join("SHA256SUMS-0.21.0.asc").is_file());
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let node = TestNode::new().await.unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());
    let archive = format!("bitcoin-0.21.0-{GCC_ARCH}.tar.gz");

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let first = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap();
    assert_eq!(first.installed, Some(v("0.21.0")));
    assert_eq!(node.downloads_of(&archive), 1);

    let second = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(node.downloads_of(&archive), 1);
    assert_eq!(node.bitcoin_current(), Some(PathBuf::from("bitcoin-0.21.0")));
}

#[tokio::test]
async fn test_invalid_signature_keeps_current_installation() {
    let node = TestNode::new().await.unwrap();
    node.install_bitcoin("0.20.1").unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Reject)).unwrap();
    let error = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::VerificationFailed { .. })
    ));
    assert_eq!(node.bitcoin_current(), Some(PathBuf::from("bitcoin-0.20.1")));
    assert!(!node.bitcoin_arch_root().join("bitcoin-0.21.0").exists());
    assert_eq!(node.downloads_of(&format!("bitcoin-0.21.0-{GCC_ARCH}.tar.gz")), 0);
}

#[tokio::test]
async fn test_key_is_imported_before_retrying() {
    let node = TestNode::new().await.unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());
    let trust =
        FakeTrustStore::new(VerifyPolicy::Accept).importable_from_url(&node.bitcoin().key_id);

    let reconciler = node.reconciler(trust).unwrap();
    reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap();

    let calls = reconciler.trust().calls();
    let key_url = node.bitcoin().key_url;
    assert!(calls.contains(&format!("import_url {key_url}")));
    assert!(!calls.iter().any(|call| call.starts_with("import_server")));
}

#[tokio::test]
async fn test_imported_key_does_not_rescue_bad_signature() {
    let node = TestNode::new().await.unwrap();
    node.install_bitcoin("0.20.1").unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());
    let trust =
        FakeTrustStore::new(VerifyPolicy::Reject).importable_from_url(&node.bitcoin().key_id);

    let reconciler = node.reconciler(trust).unwrap();
    let error = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::VerificationFailed { .. })
    ));
    let calls = reconciler.trust().calls();
    assert!(calls.contains(&format!("import_url {}", node.bitcoin().key_url)));
    assert_eq!(calls.iter().filter(|call| call.starts_with("verify ")).count(), 2);
    assert_eq!(node.bitcoin_current(), Some(PathBuf::from("bitcoin-0.20.1")));
    assert_eq!(node.downloads_of(&format!("bitcoin-0.21.0-{GCC_ARCH}.tar.gz")), 0);
}

#[tokio::test]
async fn test_failing_self_test_aborts_with_its_status() {
    let node = TestNode::new().await.unwrap();
    node.install_bitcoin("0.20.1").unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 3).unwrap());

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let error = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::SelfTestFailed { code: 3 })
    ));
    assert_eq!(node.bitcoin_current(), Some(PathBuf::from("bitcoin-0.20.1")));
}

#[tokio::test]
async fn test_skipping_tests_installs_despite_failing_suite() {
    let node = TestNode::new().await.unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 3).unwrap());

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let options = ReconcileOptions {
        restart: false,
        run_tests: false,
    };
    let row = reconciler.reconcile(&node.bitcoin(), options).await.unwrap();
    assert_eq!(row.installed, Some(v("0.21.0")));
}

#[tokio::test]
async fn test_binaries_reporting_another_version_are_rejected() {
    let node = TestNode::new().await.unwrap();
    node.install_bitcoin("0.20.1").unwrap();
    node.bitcoin_index(&["0.21.0"]);
    let mislabeled = TarballBuilder::new("bitcoin-0.21.0")
        .executable("bin/bitcoind", &version_script(&bitcoind_line("0.21.0")))
        .executable("bin/bitcoin-cli", &version_script(&bitcoin_cli_line("0.20.1")))
        .build()
        .unwrap();
    node.publish_bitcoin("0.21.0", mislabeled);

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let error = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::VersionMismatch { expected, found })
            if expected == "0.21.0" && found == "0.20.1"
    ));
    assert_eq!(node.bitcoin_current(), Some(PathBuf::from("bitcoin-0.20.1")));
}

#[tokio::test]
async fn test_restart_starts_daemon_that_is_not_running() {
    let node = TestNode::new().await.unwrap();
    let marker = node.temp.path().join("started-with");
    let daemon = format!(
        "if [ \"$1\" = \"-daemon\" ]; then echo \"$1\" > '{}'; exit 0; fi\n{}",
        marker.display(),
        version_script(&bitcoind_line("0.21.0"))
    );
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin(
        "0.21.0",
        TarballBuilder::new("bitcoin-0.21.0")
            .executable("bin/bitcoind", &daemon)
            .executable("bin/bitcoin-cli", &version_script(&bitcoin_cli_line("0.21.0")))
            .build()
            .unwrap(),
    );

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let options = ReconcileOptions {
        restart: true,
        run_tests: true,
    };
    let row = reconciler.reconcile(&node.bitcoin(), options).await.unwrap();

    assert_eq!(row.installed, Some(v("0.21.0")));
    assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "-daemon");
}

#[tokio::test]
async fn test_unpublished_release_is_skipped() {
    let node = TestNode::new().await.unwrap();
    node.install_bitcoin("0.21.0").unwrap();
    // 22.0 has a directory but no manifest yet
    node.bitcoin_index(&["0.21.0", "22.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());

    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let row = reconciler.reconcile(&node.bitcoin(), SKIP_RESTART).await.unwrap();

    assert_eq!(row.latest, v("0.21.0"));
    assert_eq!(row.installed, Some(v("0.21.0")));
    assert_eq!(node.downloads_of(&format!("bitcoin-0.21.0-{GCC_ARCH}.tar.gz")), 0);
}

#[tokio::test]
async fn test_status_does_not_wait_for_warming_daemon() {
    let mut node = TestNode::new().await.unwrap();
    node.config.start_timeout = Duration::from_secs(60);
    let name = "nodeup-it-btc0";
    node.install_bitcoin_as(name, "0.21.0").unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());
    node.client("bitcoin-cli", "echo 'error code: -28' >&2; exit 28").unwrap();
    let _daemon = Sleeper::spawn(&node, name).await;

    let mut descriptor = node.bitcoin();
    descriptor.name = name.to_string();
    let reconciler = node.reconciler(trusted(&node, VerifyPolicy::Accept)).unwrap();
    let started = Instant::now();
    let row = reconciler.reconcile(&descriptor, SKIP_RESTART).await.unwrap();

    assert_eq!(row.installed, Some(v("0.21.0")));
    assert_eq!(row.running, RunningState::Starting);
    assert!(started.elapsed() < Duration::from_secs(30));
}
