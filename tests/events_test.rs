use repmgrd::events::{EventName, EventRecorder};

#[tokio::test]
async fn no_connection_stashes_single_pending_event() {
    let recorder = EventRecorder::new();
    recorder
        .record(None, 1, EventName::RepmgrdLocalDisconnect, true, "first")
        .await;
    recorder
        .record(None, 1, EventName::RepmgrdLocalReconnect, true, "second")
        .await;

    let (node_id, event, detail) = recorder.pending_summary().unwrap();
    assert_eq!(node_id, 1);
    assert_eq!(event, EventName::RepmgrdLocalReconnect);
    assert_eq!(detail, "second");
}

#[tokio::test]
async fn no_pending_event_before_any_record() {
    let recorder = EventRecorder::new();
    assert!(recorder.pending_summary().is_none());
}

#[test]
fn event_names_match_repmgr_vocabulary() {
    assert_eq!(EventName::RepmgrdStart.as_str(), "repmgrd_start");
    assert_eq!(
        EventName::RepmgrdFailoverPromote.as_str(),
        "repmgrd_failover_promote"
    );
    assert_eq!(
        EventName::RepmgrdFailoverFollow.as_str(),
        "repmgrd_failover_follow"
    );
}
