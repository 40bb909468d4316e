// src/db/supervisor.rs

//! Wraps one logical connection to a database endpoint: bounded-retry reconnection,
//! liveness probing, and the UP/DOWN/UNKNOWN state this daemon bases its decisions on.
//!
//! Grounded on `warden::worker::MasterMonitor::ping_instance` and the connect step of
//! `connect_and_subscribe` — both open a short-lived client, probe, and give up cleanly
//! on failure rather than propagating an error to the caller.

use crate::events::{EventName, EventRecorder};
use std::time::Duration;
use tokio::time::sleep;
use tokio_postgres::{Client, NoTls};
use tracing::{info, warn};

/// Liveness as observed by the last probe. `Unknown` covers the gap between a
/// connection dropping and the next successful (or exhausted) reconnect attempt; it is
/// never treated as UP for decision purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Up,
    Down,
    Unknown,
}

/// Default bound on reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const RETRY_PERIOD: Duration = Duration::from_secs(1);

/// A live handle to a node's database. Holds the `tokio_postgres::Client` plus the
/// connection-driver task, spawned onto its own task the way a server loop drives each
/// accepted connection.
pub struct ConnectionHandle {
    pub client: Client,
    driver: tokio::task::JoinHandle<()>,
}

impl ConnectionHandle {
    async fn connect(conninfo: &str) -> anyhow::Result<Self> {
        let (client, connection) = tokio_postgres::connect(conninfo, NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("connection driver task exited: {}", e);
            }
        });
        Ok(Self { client, driver })
    }

    /// Cheap liveness probe: `SELECT 1`, discarding the result.
    pub async fn probe(&self) -> bool {
        self.client.simple_query("SELECT 1").await.is_ok()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Supervises one logical connection: opens it, probes it, and reconnects with a
/// bounded, fixed-period retry policy — deliberately not exponential backoff, since a
/// single bounded window is what's wanted here: `try_reconnect` either succeeds within
/// `max_attempts` or reports DOWN and returns control to the caller.
pub struct ConnectionSupervisor {
    pub max_attempts: u32,
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ConnectionSupervisor {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Cheaply checks whether `conninfo` is reachable without keeping the connection.
    pub async fn is_up(&self, conninfo: &str) -> bool {
        match ConnectionHandle::connect(conninfo).await {
            Ok(handle) => handle.probe().await,
            Err(_) => false,
        }
    }

    /// Opens a connection. If `must_succeed` is true, the error is returned to the
    /// caller (used only at startup); otherwise failures should be routed through
    /// `try_reconnect` instead.
    pub async fn open(&self, conninfo: &str, must_succeed: bool) -> anyhow::Result<ConnectionHandle> {
        let result = ConnectionHandle::connect(conninfo).await;
        if must_succeed {
            result
        } else {
            Ok(result?)
        }
    }

    /// Polls with a fixed 1s period for up to `max_attempts` attempts. Each attempt
    /// probes liveness cheaply, then opens a session if the probe succeeds. Returns
    /// `(Some(handle), Liveness::Up)` on first success, else `(None, Liveness::Down)`.
    /// Emits `repmgrd_local_disconnect`/`repmgrd_local_reconnect` events through
    /// `recorder` on UP<->DOWN/UNKNOWN transitions.
    pub async fn try_reconnect(
        &self,
        conninfo: &str,
        node_id: i32,
        recorder: &EventRecorder,
    ) -> (Option<ConnectionHandle>, Liveness) {
        recorder
            .record(None, node_id, EventName::RepmgrdLocalDisconnect, true, "connection lost")
            .await;

        for attempt in 1..=self.max_attempts {
            info!(
                "checking state of node, {} of {} attempts",
                attempt, self.max_attempts
            );
            match ConnectionHandle::connect(conninfo).await {
                Ok(handle) if handle.probe().await => {
                    recorder
                        .record(
                            Some(&handle.client),
                            node_id,
                            EventName::RepmgrdLocalReconnect,
                            true,
                            "connection reestablished",
                        )
                        .await;
                    return (Some(handle), Liveness::Up);
                }
                _ => {
                    if attempt < self.max_attempts {
                        sleep(RETRY_PERIOD).await;
                    }
                }
            }
        }

        warn!(
            "unable to reconnect to node after {} attempts",
            self.max_attempts
        );
        (None, Liveness::Down)
    }
}
