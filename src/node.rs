// src/node.rs

//! The data model shared by every component: a peer snapshot (`NodeInfo`) and the
//! small closed enums that travel alongside it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The role a node is currently playing in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Primary,
    Standby,
    /// Reserved; rejected at every call site that would act on it.
    Witness,
    /// Reserved; rejected at every call site that would act on it.
    Bdr,
    Unknown,
}

impl NodeRole {
    /// `true` for roles this daemon can actually monitor and promote.
    pub fn is_implemented(self) -> bool {
        matches!(self, NodeRole::Primary | NodeRole::Standby)
    }
}

/// An opaque monotonic replication position. Greater means more up-to-date.
/// Modeled as a newtype over the raw LSN integer so callers can't accidentally compare
/// it against an unrelated `u64` (node ids, offsets, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const INVALID: Lsn = Lsn(0);
}

/// Immutable snapshot of a peer node, as read from the local Node Directory or
/// refreshed mid-election from a peer connection.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub node_id: i32,
    pub node_name: String,
    pub role: NodeRole,
    pub upstream_node_id: Option<i32>,
    pub conninfo: String,
    pub priority: i32,
    pub active: bool,
    pub last_wal_receive_lsn: Lsn,

    /// Transient: set during an election round only, when this node was reachable and
    /// accepted our candidature announcement. Meaningless outside an election.
    pub is_visible: bool,
}

impl NodeInfo {
    /// Ranking used by the tie-break / best-candidate poll: highest LSN, then highest
    /// priority, then lowest node_id. Implemented as `Ord` on a ranking key rather than
    /// directly on `NodeInfo` so the comparison direction (`max_by_key`) reads plainly
    /// at the call site in `election.rs`.
    pub fn candidacy_rank(&self) -> CandidacyRank {
        CandidacyRank {
            lsn: self.last_wal_receive_lsn,
            priority: self.priority,
            node_id: self.node_id,
        }
    }
}

/// The three-part sort key: LSN desc, priority desc, node_id asc.
/// `Ord` is derived field-by-field in declaration order, so the field order below
/// directly encodes the tie-break precedence; `Ordering` is flipped on `node_id` via
/// `Reverse` since it alone breaks ties ascending while the others break descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidacyRank {
    lsn: Lsn,
    priority: i32,
    node_id: i32,
}

impl PartialOrd for CandidacyRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CandidacyRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lsn
            .cmp(&other.lsn)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

/// The persistent voting state a peer reports for itself, read through the
/// `VotingStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeVotingStatus {
    NoVote,
    VoteRequestReceived,
    VoteInitiated,
    Unknown,
}
