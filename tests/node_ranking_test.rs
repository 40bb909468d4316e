use repmgrd::node::{Lsn, NodeInfo, NodeRole};

fn node(id: i32, lsn: u64, priority: i32) -> NodeInfo {
    NodeInfo {
        node_id: id,
        node_name: format!("node{id}"),
        role: NodeRole::Standby,
        upstream_node_id: Some(1),
        conninfo: String::new(),
        priority,
        active: true,
        last_wal_receive_lsn: Lsn(lsn),
        is_visible: true,
    }
}

#[test]
fn rank_prefers_highest_lsn() {
    let ahead = node(2, 200, 100);
    let behind = node(3, 100, 100);
    assert!(ahead.candidacy_rank() > behind.candidacy_rank());
}

#[test]
fn rank_breaks_lsn_tie_on_priority() {
    let high_priority = node(2, 100, 200);
    let low_priority = node(3, 100, 100);
    assert!(high_priority.candidacy_rank() > low_priority.candidacy_rank());
}

#[test]
fn rank_breaks_priority_tie_on_lowest_node_id() {
    let lower_id = node(2, 100, 100);
    let higher_id = node(3, 100, 100);
    assert!(lower_id.candidacy_rank() > higher_id.candidacy_rank());
}

#[test]
fn witness_and_bdr_roles_report_unimplemented() {
    assert!(!NodeRole::Witness.is_implemented());
    assert!(!NodeRole::Bdr.is_implemented());
    assert!(NodeRole::Primary.is_implemented());
    assert!(NodeRole::Standby.is_implemented());
}
