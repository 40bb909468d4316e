use repmgrd::config::FailoverMode;
use repmgrd::monitor::{heartbeat_due, validate_active_for_automatic};
use repmgrd::node::{Lsn, NodeInfo, NodeRole};
use std::time::Duration;

fn node(active: bool) -> NodeInfo {
    NodeInfo {
        node_id: 1,
        node_name: "node1".to_string(),
        role: NodeRole::Standby,
        upstream_node_id: Some(2),
        conninfo: String::new(),
        priority: 100,
        active,
        last_wal_receive_lsn: Lsn(0),
        is_visible: false,
    }
}

#[test]
fn inactive_node_under_automatic_failover_is_rejected() {
    let err = validate_active_for_automatic(&node(false), FailoverMode::Automatic).unwrap_err();
    assert!(matches!(
        err,
        repmgrd::error::RepmgrdError::InactiveNodeAutomatic(1)
    ));
}

#[test]
fn inactive_node_under_manual_failover_is_accepted() {
    assert!(validate_active_for_automatic(&node(false), FailoverMode::Manual).is_ok());
}

#[test]
fn active_node_under_automatic_failover_is_accepted() {
    assert!(validate_active_for_automatic(&node(true), FailoverMode::Automatic).is_ok());
}

#[test]
fn heartbeat_disabled_when_interval_is_zero_or_negative() {
    assert!(!heartbeat_due(Duration::from_secs(100), 0));
    assert!(!heartbeat_due(Duration::from_secs(100), -1));
}

#[test]
fn heartbeat_due_once_elapsed_reaches_interval() {
    assert!(!heartbeat_due(Duration::from_secs(5), 10));
    assert!(heartbeat_due(Duration::from_secs(10), 10));
    assert!(heartbeat_due(Duration::from_secs(11), 10));
}
