use repmgrd::db::{FakeCluster, FakePeerDialer, VotingStore};
use repmgrd::election::{run_election, select_best_candidate};
use repmgrd::node::{Lsn, NodeInfo, NodeRole};
use repmgrd::state::ElectionResult;

fn standby(id: i32, lsn: u64, priority: i32) -> NodeInfo {
    NodeInfo {
        node_id: id,
        node_name: format!("node{id}"),
        role: NodeRole::Standby,
        upstream_node_id: Some(1),
        conninfo: format!("host=node{id}"),
        priority,
        active: true,
        last_wal_receive_lsn: Lsn(lsn),
        is_visible: false,
    }
}

#[tokio::test]
async fn zero_siblings_wins_by_default() {
    let cluster = FakeCluster::new();
    let me = standby(2, 100, 100);
    cluster.add_node(me.clone());
    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);

    let outcome = run_election(&store, &dialer, &me, 1).await.unwrap();
    assert_eq!(outcome.result, ElectionResult::Won);
    assert!(outcome.siblings.is_empty());
}

#[tokio::test]
async fn single_visible_sibling_grants_vote_and_wins() {
    let cluster = FakeCluster::new();
    let me = standby(2, 200, 100);
    let sib = standby(3, 100, 100);
    cluster.add_node(me.clone());
    cluster.add_node(sib.clone());
    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);

    let outcome = run_election(&store, &dialer, &me, 1).await.unwrap();
    assert_eq!(outcome.result, ElectionResult::Won);
}

#[tokio::test]
async fn unreachable_sibling_is_skipped_not_fatal() {
    let cluster = FakeCluster::new();
    let me = standby(2, 200, 100);
    let sib = standby(3, 300, 100);
    cluster.add_node(me.clone());
    cluster.add_node(sib.clone());
    cluster.mark_unreachable(3);
    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);

    // Only self is visible, so unanimity-of-1 trivially holds.
    let outcome = run_election(&store, &dialer, &me, 1).await.unwrap();
    assert_eq!(outcome.result, ElectionResult::Won);
}

#[tokio::test]
async fn sibling_already_candidate_forces_withdrawal() {
    let cluster = FakeCluster::new();
    let me = standby(2, 200, 100);
    let sib = standby(3, 300, 100);
    cluster.add_node(me.clone());
    cluster.add_node(sib.clone());

    // Sibling claims candidacy first.
    let sib_store = cluster.store_for(3);
    sib_store.set_voting_status_initiated().await.unwrap();

    let dialer = FakePeerDialer::new(cluster.clone());
    let store = cluster.store_for(2);
    let outcome = run_election(&store, &dialer, &me, 1).await.unwrap();
    assert_eq!(outcome.result, ElectionResult::NotCandidate);
}

#[test]
fn best_candidate_prefers_highest_lsn_then_priority_then_lowest_id() {
    let me = standby(1, 100, 50);
    let siblings = vec![standby(2, 300, 10), standby(3, 300, 10)];
    let best = select_best_candidate(&me, &siblings);
    assert_eq!(best.node_id, 2);
}

#[test]
fn best_candidate_can_be_self() {
    let me = standby(1, 500, 50);
    let siblings = vec![standby(2, 100, 10)];
    let best = select_best_candidate(&me, &siblings);
    assert_eq!(best.node_id, 1);
}
