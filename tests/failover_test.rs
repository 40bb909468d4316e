use repmgrd::db::{FakeCluster, FakePeerDialer, VotingStore};
use repmgrd::events::EventRecorder;
use repmgrd::executor::FakeExecutor;
use repmgrd::failover::run;
use repmgrd::node::{Lsn, NodeInfo, NodeRole};
use repmgrd::state::{ElectionResult, FailoverState};
use std::time::Duration;

fn standby(id: i32, lsn: u64, priority: i32, upstream: i32) -> NodeInfo {
    NodeInfo {
        node_id: id,
        node_name: format!("node{id}"),
        role: NodeRole::Standby,
        upstream_node_id: Some(upstream),
        conninfo: format!("host=node{id}"),
        priority,
        active: true,
        last_wal_receive_lsn: Lsn(lsn),
        is_visible: false,
    }
}

fn primary(id: i32) -> NodeInfo {
    NodeInfo {
        node_id: id,
        node_name: format!("node{id}"),
        role: NodeRole::Primary,
        upstream_node_id: None,
        conninfo: format!("host=node{id}"),
        priority: 100,
        active: true,
        last_wal_receive_lsn: Lsn(0),
        is_visible: false,
    }
}

#[tokio::test]
async fn won_election_promotes_self_on_successful_command() {
    let cluster = FakeCluster::new();
    cluster.add_node(primary(1));
    cluster.add_node(standby(2, 100, 100, 1));
    cluster.promote(2, Some(1));

    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);
    let executor = FakeExecutor::succeeding();
    let recorder = EventRecorder::new();
    let me = standby(2, 100, 100, 1);
    let siblings = [];

    let outcome = run(
        ElectionResult::Won,
        &me,
        &siblings,
        1,
        &store,
        &dialer,
        &executor,
        &recorder,
        "pg_promote",
        "restart_as_standby",
        Duration::ZERO,
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, FailoverState::Promoted);
    assert!(outcome.updated_self.is_some());
    assert_eq!(outcome.updated_self.unwrap().role, NodeRole::Primary);
}

#[tokio::test]
async fn won_election_promote_command_failure_is_promotion_failed() {
    let cluster = FakeCluster::new();
    cluster.add_node(primary(1));
    cluster.add_node(standby(2, 100, 100, 1));

    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);
    let executor = FakeExecutor::failing();
    let recorder = EventRecorder::new();
    let me = standby(2, 100, 100, 1);
    let siblings = [];

    let outcome = run(
        ElectionResult::Won,
        &me,
        &siblings,
        1,
        &store,
        &dialer,
        &executor,
        &recorder,
        "pg_promote",
        "restart_as_standby",
        Duration::ZERO,
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, FailoverState::PromotionFailed);
}

#[tokio::test]
async fn promote_failure_with_upstream_back_is_primary_reappeared() {
    let cluster = FakeCluster::new();
    cluster.add_node(primary(1));
    cluster.add_node(standby(2, 100, 100, 1));

    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);
    let executor = FakeExecutor::failing();
    let recorder = EventRecorder::new();
    let me = standby(2, 100, 100, 1);
    let siblings = [];

    // Primary (node 1) is still registered as primary and active: the promote command
    // failed because the original primary never actually went away.
    let outcome = run(
        ElectionResult::Won,
        &me,
        &siblings,
        1,
        &store,
        &dialer,
        &executor,
        &recorder,
        "pg_promote",
        "restart_as_standby",
        Duration::ZERO,
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, FailoverState::PrimaryReappeared);
    assert_eq!(outcome.new_upstream_id, Some(1));
}

#[tokio::test]
async fn lost_election_with_other_best_candidate_waits_then_follows() {
    let cluster = FakeCluster::new();
    cluster.add_node(standby(2, 100, 100, 1));
    cluster.add_node(standby(3, 300, 100, 1));

    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);
    let executor = FakeExecutor::succeeding();
    let recorder = EventRecorder::new();
    let me = standby(2, 100, 100, 1);
    let siblings = [standby(3, 300, 100, 1)];

    // Node 3 promotes out-of-band, the way the real winner would after being notified.
    cluster.promote(3, Some(1));

    let outcome = run(
        ElectionResult::Lost,
        &me,
        &siblings,
        1,
        &store,
        &dialer,
        &executor,
        &recorder,
        "pg_promote",
        "restart_as_standby",
        Duration::ZERO,
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, FailoverState::FollowedNewPrimary);
    assert_eq!(outcome.new_upstream_id, Some(3));
}

#[tokio::test(start_paused = true)]
async fn not_candidate_waits_and_times_out_without_notification() {
    let cluster = FakeCluster::new();
    cluster.add_node(standby(2, 100, 100, 1));

    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);
    let executor = FakeExecutor::succeeding();
    let recorder = EventRecorder::new();
    let me = standby(2, 100, 100, 1);
    let siblings = [];

    // No one ever calls notify_follow_primary, so get_new_primary never resolves; the
    // orchestrator gives up after its fixed number of polling iterations.
    let outcome = run(
        ElectionResult::NotCandidate,
        &me,
        &siblings,
        1,
        &store,
        &dialer,
        &executor,
        &recorder,
        "pg_promote",
        "restart_as_standby",
        Duration::ZERO,
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert_eq!(outcome.state, FailoverState::NoNewPrimary);
}
