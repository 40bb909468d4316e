// src/db/fake.rs

//! An in-memory `VotingStore` fake used only by tests, so the Election Engine and
//! Failover Orchestrator can be exercised without a live Postgres cluster.

use crate::db::voting::VotingStore;
use crate::node::{Lsn, NodeInfo, NodeVotingStatus};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ClusterInner {
    nodes: HashMap<i32, NodeInfo>,
    voting_status: HashMap<i32, NodeVotingStatus>,
    term: u64,
    /// (node asked, term) -> candidate already granted a vote in that term.
    voted: HashMap<(i32, u64), i32>,
    new_primary: Option<i32>,
    /// Nodes simulated as unreachable — `FakePeerDialer::dial` returns `None` for these.
    unreachable: HashSet<i32>,
}

/// A shared, in-memory stand-in for the database tables every `VotingStore`
/// implementation reads and writes. Construct one per simulated cluster, then hand out
/// a `FakeVotingStore` per node so each can be passed around as "the connection to that
/// node", exactly as the real `ConnectionHandle`-bound `PgVotingStore` is.
#[derive(Clone, Default)]
pub struct FakeCluster(Arc<Mutex<ClusterInner>>);

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self, info: NodeInfo) {
        let mut inner = self.0.lock().unwrap();
        inner.voting_status.insert(info.node_id, NodeVotingStatus::NoVote);
        inner.nodes.insert(info.node_id, info);
    }

    pub fn store_for(&self, node_id: i32) -> FakeVotingStore {
        FakeVotingStore {
            node_id,
            cluster: self.clone(),
        }
    }

    pub fn set_new_primary(&self, node_id: i32) {
        self.0.lock().unwrap().new_primary = Some(node_id);
    }

    pub fn node(&self, node_id: i32) -> NodeInfo {
        self.0.lock().unwrap().nodes[&node_id].clone()
    }

    pub fn mark_unreachable(&self, node_id: i32) {
        self.0.lock().unwrap().unreachable.insert(node_id);
    }

    pub fn is_reachable(&self, node_id: i32) -> bool {
        !self.0.lock().unwrap().unreachable.contains(&node_id)
    }

    /// Flips `node_id` to PRIMARY and deactivates the node it replaces, if any.
    /// Simulates what a real `promote_command`/`follow_command` run would cause the
    /// local database to report on the next read.
    pub fn promote(&self, node_id: i32, replacing: Option<i32>) {
        let mut inner = self.0.lock().unwrap();
        if let Some(old) = replacing
            && let Some(n) = inner.nodes.get_mut(&old)
        {
            n.role = crate::node::NodeRole::Standby;
        }
        if let Some(n) = inner.nodes.get_mut(&node_id) {
            n.role = crate::node::NodeRole::Primary;
            n.upstream_node_id = None;
        }
    }

    pub fn set_upstream(&self, node_id: i32, upstream_id: i32) {
        let mut inner = self.0.lock().unwrap();
        if let Some(n) = inner.nodes.get_mut(&node_id) {
            n.upstream_node_id = Some(upstream_id);
            n.role = crate::node::NodeRole::Standby;
        }
    }
}

/// A `VotingStore` bound to one node's slice of a `FakeCluster` — it speaks "as" that
/// node when asked to vote or accept a candidature, exactly as a live connection to that
/// node's database would.
pub struct FakeVotingStore {
    node_id: i32,
    cluster: FakeCluster,
}

#[async_trait]
impl VotingStore for FakeVotingStore {
    async fn get_node_record(&self, node_id: i32) -> anyhow::Result<Option<NodeInfo>> {
        Ok(self.cluster.0.lock().unwrap().nodes.get(&node_id).cloned())
    }

    async fn get_active_siblings(
        &self,
        self_id: i32,
        exclude_upstream_id: i32,
    ) -> anyhow::Result<Vec<NodeInfo>> {
        let inner = self.cluster.0.lock().unwrap();
        Ok(inner
            .nodes
            .values()
            .filter(|n| {
                n.active
                    && n.node_id != self_id
                    && n.node_id != exclude_upstream_id
                    && n.role == crate::node::NodeRole::Standby
            })
            .cloned()
            .collect())
    }

    async fn get_primary(&self) -> anyhow::Result<Option<NodeInfo>> {
        Ok(self
            .cluster
            .0
            .lock()
            .unwrap()
            .nodes
            .values()
            .find(|n| n.active && n.role == crate::node::NodeRole::Primary)
            .cloned())
    }

    async fn get_voting_status(&self) -> anyhow::Result<NodeVotingStatus> {
        Ok(self
            .cluster
            .0
            .lock()
            .unwrap()
            .voting_status
            .get(&self.node_id)
            .copied()
            .unwrap_or(NodeVotingStatus::Unknown))
    }

    async fn set_voting_status_initiated(&self) -> anyhow::Result<u64> {
        let mut inner = self.cluster.0.lock().unwrap();
        inner.term += 1;
        let term = inner.term;
        inner
            .voting_status
            .insert(self.node_id, NodeVotingStatus::VoteInitiated);
        Ok(term)
    }

    async fn announce_candidature(&self, candidate: &NodeInfo, _term: u64) -> anyhow::Result<bool> {
        let mut inner = self.cluster.0.lock().unwrap();
        let already_candidate = inner
            .voting_status
            .get(&self.node_id)
            .copied()
            .unwrap_or(NodeVotingStatus::NoVote)
            == NodeVotingStatus::VoteInitiated
            && candidate.node_id != self.node_id;

        if already_candidate {
            return Ok(false);
        }

        inner
            .voting_status
            .insert(self.node_id, NodeVotingStatus::VoteRequestReceived);
        Ok(true)
    }

    async fn request_vote(&self, candidate: &NodeInfo, term: u64) -> anyhow::Result<bool> {
        let mut inner = self.cluster.0.lock().unwrap();
        match inner.voted.get(&(self.node_id, term)) {
            Some(&already) if already != candidate.node_id => Ok(false),
            _ => {
                inner.voted.insert((self.node_id, term), candidate.node_id);
                Ok(true)
            }
        }
    }

    async fn get_new_primary(&self) -> anyhow::Result<Option<i32>> {
        Ok(self.cluster.0.lock().unwrap().new_primary)
    }

    async fn notify_follow_primary(&self, target_id: i32) -> anyhow::Result<()> {
        self.cluster.0.lock().unwrap().new_primary = Some(target_id);
        Ok(())
    }

    async fn reset_voting_status(&self) -> anyhow::Result<()> {
        let mut inner = self.cluster.0.lock().unwrap();
        inner
            .voting_status
            .insert(self.node_id, NodeVotingStatus::NoVote);
        Ok(())
    }

    async fn get_last_wal_receive_lsn(&self) -> anyhow::Result<Lsn> {
        Ok(self
            .cluster
            .0
            .lock()
            .unwrap()
            .nodes
            .get(&self.node_id)
            .map(|n| n.last_wal_receive_lsn)
            .unwrap_or(Lsn::INVALID))
    }

    async fn is_primary(&self) -> anyhow::Result<bool> {
        Ok(self
            .cluster
            .0
            .lock()
            .unwrap()
            .nodes
            .get(&self.node_id)
            .map(|n| n.role == crate::node::NodeRole::Primary)
            .unwrap_or(false))
    }
}
