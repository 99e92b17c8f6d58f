//! Several daemons in one run, with and without continue-on-error.

use nodeup_cli::core::UpdaterError;
use nodeup_cli::daemon::{DaemonOutcome, ReconcileOptions};
use nodeup_cli::test_utils::{FakeTrustStore, VerifyPolicy};

use crate::common::{TestNode, bitcoin_archive, lnd_archive};

const TAG: &str = "v0.17.0-beta";
const LND: &str = "nodeup-it-lnd9";

fn trust(node: &TestNode) -> FakeTrustStore {
    FakeTrustStore::new(VerifyPolicy::Accept)
        .with_key(&node.bitcoin().key_id)
        .with_key(&node.lnd(LND).key_id)
}

fn publish_lnd(node: &TestNode) {
    node.lnd_latest(TAG);
    node.publish_lnd(TAG, lnd_archive(LND, TAG, "0.17.0-beta").unwrap());
}

#[tokio::test]
async fn test_continue_after_unreachable_index() {
    let node = TestNode::new().await.unwrap();
    // no Bitcoin Core index is served
    publish_lnd(&node);

    let reconciler = node.reconciler(trust(&node)).unwrap();
    let descriptors = [node.bitcoin(), node.lnd(LND)];
    let report = reconciler.run(&descriptors, ReconcileOptions::default(), true).await.unwrap();

    assert!(report.has_failures());
    assert_eq!(report.failed_names(), vec!["bitcoind"]);
    assert!(matches!(&report.outcomes[1], DaemonOutcome::Done(row) if row.name == LND));
    assert!(node.lnd_current().is_some());
}

#[tokio::test]
async fn test_first_failure_ends_run_by_default() {
    let node = TestNode::new().await.unwrap();
    publish_lnd(&node);

    let reconciler = node.reconciler(trust(&node)).unwrap();
    let descriptors = [node.bitcoin(), node.lnd(LND)];
    let result = reconciler.run(&descriptors, ReconcileOptions::default(), false).await;

    assert!(result.is_err());
    assert_eq!(node.lnd_current(), None);
}

#[tokio::test]
async fn test_failed_self_test_ends_run_despite_continue() {
    let node = TestNode::new().await.unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 2).unwrap());
    publish_lnd(&node);

    let reconciler = node.reconciler(trust(&node)).unwrap();
    let descriptors = [node.bitcoin(), node.lnd(LND)];
    let error =
        reconciler.run(&descriptors, ReconcileOptions::default(), true).await.unwrap_err();

    assert!(matches!(
        error.downcast_ref::<UpdaterError>(),
        Some(UpdaterError::SelfTestFailed { code: 2 })
    ));
    assert_eq!(node.lnd_current(), None);
}

#[tokio::test]
async fn test_all_daemons_reconciled() {
    let node = TestNode::new().await.unwrap();
    node.bitcoin_index(&["0.21.0"]);
    node.publish_bitcoin("0.21.0", bitcoin_archive("0.21.0", 0).unwrap());
    publish_lnd(&node);

    let reconciler = node.reconciler(trust(&node)).unwrap();
    let descriptors = [node.bitcoin(), node.lnd(LND)];
    let report = reconciler.run(&descriptors, ReconcileOptions::default(), false).await.unwrap();

    assert!(!report.has_failures());
    assert_eq!(report.outcomes.len(), 2);
    assert!(node.bitcoin_current().is_some());
    assert!(node.lnd_current().is_some());
}
