// src/events.rs

//! The Event Recorder: an append-only log of named lifecycle events, written through
//! whatever connection happens to be live.

use parking_lot::Mutex;
use tokio_postgres::Client;
use tracing::{debug, warn};

/// The closed vocabulary of event names this daemon ever records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    RepmgrdStart,
    RepmgrdLocalDisconnect,
    RepmgrdLocalReconnect,
    RepmgrdFailoverPromote,
    RepmgrdFailoverFollow,
    RepmgrdFailoverAbort,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::RepmgrdStart => "repmgrd_start",
            EventName::RepmgrdLocalDisconnect => "repmgrd_local_disconnect",
            EventName::RepmgrdLocalReconnect => "repmgrd_local_reconnect",
            EventName::RepmgrdFailoverPromote => "repmgrd_failover_promote",
            EventName::RepmgrdFailoverFollow => "repmgrd_failover_follow",
            EventName::RepmgrdFailoverAbort => "repmgrd_failover_abort",
        }
    }
}

#[derive(Debug, Clone)]
struct PendingEvent {
    node_id: i32,
    event: EventName,
    success: bool,
    detail: String,
}

/// Records named lifecycle events through `create_event_record`. A `None` connection is
/// allowed: the event is stashed and replayed, best-effort, the next time `record` is
/// called with a live connection. There is no queue beyond the single most recent
/// pending entry.
#[derive(Default)]
pub struct EventRecorder {
    pending: Mutex<Option<PendingEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Records one event. If `conn` is `Some`, attempts to replay any stashed pending
    /// event first, then writes this one; on failure (or if `conn` is `None`) this
    /// event becomes the new pending entry, replacing whatever was there before.
    pub async fn record(
        &self,
        conn: Option<&Client>,
        node_id: i32,
        event: EventName,
        success: bool,
        detail: &str,
    ) {
        let Some(client) = conn else {
            self.stash(node_id, event, success, detail);
            return;
        };

        if let Some(pending) = self.take_pending() {
            if Self::write(client, &pending).await.is_err() {
                warn!("failed to replay pending event record, will retry later");
                *self.pending.lock() = Some(pending);
            }
        }

        let this = PendingEvent {
            node_id,
            event,
            success,
            detail: detail.to_string(),
        };
        if let Err(e) = Self::write(client, &this).await {
            warn!("failed to write event record {}: {}", event.as_str(), e);
            self.stash(node_id, event, success, detail);
        } else {
            debug!("recorded event {}", event.as_str());
        }
    }

    fn stash(&self, node_id: i32, event: EventName, success: bool, detail: &str) {
        *self.pending.lock() = Some(PendingEvent {
            node_id,
            event,
            success,
            detail: detail.to_string(),
        });
    }

    fn take_pending(&self) -> Option<PendingEvent> {
        self.pending.lock().take()
    }

    /// A snapshot of the currently stashed event, if any. Exposed for status reporting:
    /// an operator watching the daemon wants to know if event delivery is backlogged.
    pub fn pending_summary(&self) -> Option<(i32, EventName, String)> {
        self.pending
            .lock()
            .as_ref()
            .map(|p| (p.node_id, p.event, p.detail.clone()))
    }

    async fn write(client: &Client, event: &PendingEvent) -> Result<(), tokio_postgres::Error> {
        client
            .execute(
                "INSERT INTO repmgr.events (node_id, event, successful, details, event_timestamp) \
                 VALUES ($1, $2, $3, $4, now())",
                &[
                    &event.node_id,
                    &event.event.as_str(),
                    &event.success,
                    &event.detail,
                ],
            )
            .await
            .map(|_| ())
    }
}
