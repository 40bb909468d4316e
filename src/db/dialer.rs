// src/db/dialer.rs

//! Opens a transient `VotingStore`-backed connection to a peer node. Used by the
//! Election Engine (candidacy canvass, vote requests) and the Failover Orchestrator
//! (promotion-candidate health check, follow-target verification, follower
//! notification) — anywhere a component needs to open a connection to peer X.

use crate::db::fake::FakeCluster;
use crate::db::supervisor::ConnectionSupervisor;
use crate::db::voting::{OwnedPgVotingStore, VotingStore};
use crate::node::NodeInfo;
use async_trait::async_trait;

#[async_trait]
pub trait PeerDialer: Send + Sync {
    /// `None` if the peer is unreachable — never an error. Unreachable peers during an
    /// election are skipped, not fatal.
    async fn dial(&self, peer: &NodeInfo) -> Option<Box<dyn VotingStore>>;
}

/// Dials a peer's `conninfo` directly with a single connection attempt (no retry loop —
/// an unreachable peer during an election is simply skipped, not retried).
pub struct PgPeerDialer {
    supervisor: ConnectionSupervisor,
}

impl PgPeerDialer {
    pub fn new() -> Self {
        Self {
            supervisor: ConnectionSupervisor::new(1),
        }
    }
}

impl Default for PgPeerDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerDialer for PgPeerDialer {
    async fn dial(&self, peer: &NodeInfo) -> Option<Box<dyn VotingStore>> {
        let handle = self.supervisor.open(&peer.conninfo, false).await.ok()?;
        Some(Box::new(OwnedPgVotingStore::new(handle)))
    }
}

/// Dials into a `FakeCluster` instead of the network, honoring
/// `FakeCluster::mark_unreachable`.
pub struct FakePeerDialer {
    cluster: FakeCluster,
}

impl FakePeerDialer {
    pub fn new(cluster: FakeCluster) -> Self {
        Self { cluster }
    }
}

#[async_trait]
impl PeerDialer for FakePeerDialer {
    async fn dial(&self, peer: &NodeInfo) -> Option<Box<dyn VotingStore>> {
        if self.cluster.is_reachable(peer.node_id) {
            Some(Box::new(self.cluster.store_for(peer.node_id)))
        } else {
            None
        }
    }
}
