// src/state.rs

//! `LocalState`: the process-wide singleton, plus the two closed result enums the rest
//! of the daemon dispatches on.
//!
//! A naive port would alias the primary connection directly to whichever connection
//! (local or upstream) currently happens to point at the primary, and that alias
//! silently dangles the moment the role flips. `LocalState::primary_client` below avoids
//! that: it never stores a second `Client`, it just picks which already-owned connection
//! currently points at the primary, recomputed on every call.

use crate::db::ConnectionHandle;
use crate::node::NodeInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_postgres::Client;

/// The stage of an in-progress (or completed, or never-started) failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverState {
    Unknown,
    None,
    Promoted,
    PromotionFailed,
    PrimaryReappeared,
    LocalNodeFailure,
    WaitingNewPrimary,
    FollowedNewPrimary,
    FollowingOriginalPrimary,
    NoNewPrimary,
    FollowFail,
    NodeNotificationError,
}

/// The outcome of one election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionResult {
    Won,
    Lost,
    NotCandidate,
}

/// A hot-reload / termination flag flipped by the signal handler and observed by the
/// main loop at defined suspension points only — never torn down mid-query.
#[derive(Clone, Default)]
pub struct SignalFlags {
    reload: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
}

impl SignalFlags {
    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    pub fn should_terminate(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }
}

/// The process-wide singleton. Connections are owned here exclusively; only the
/// Election Engine opens transient peer connections, and it always closes them before
/// returning.
pub struct LocalState {
    pub self_info: NodeInfo,
    pub local_conn: Option<ConnectionHandle>,
    pub upstream_conn: Option<ConnectionHandle>,
    pub failover_state: FailoverState,
    pub standby_nodes: Vec<NodeInfo>,
    pub startup_event_logged: bool,
    pub signals: SignalFlags,
}

impl LocalState {
    pub fn new(self_info: NodeInfo) -> Self {
        Self {
            self_info,
            local_conn: None,
            upstream_conn: None,
            failover_state: FailoverState::Unknown,
            standby_nodes: Vec::new(),
            startup_event_logged: false,
            signals: SignalFlags::default(),
        }
    }

    /// The primary connection as a *view*: whichever owned connection currently points
    /// at the primary, computed fresh from `self_info.role` rather than stored as a
    /// separate owning handle.
    pub fn primary_client(&self) -> Option<&Client> {
        use crate::node::NodeRole;
        match self.self_info.role {
            NodeRole::Primary => self.local_conn.as_ref().map(|h| &h.client),
            NodeRole::Standby => self.upstream_conn.as_ref().map(|h| &h.client),
            _ => None,
        }
    }

    /// Closes and drops both owned connections, e.g. before a follow action that
    /// implies a local restart driven by the external follow command.
    pub fn close_connections(&mut self) {
        self.local_conn = None;
        self.upstream_conn = None;
    }
}
