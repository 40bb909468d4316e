// src/election.rs

//! The Election Engine: one round of candidacy, canvass, and tallying.
//! Entered only from the Standby Monitor after confirmed upstream loss.

use crate::db::{PeerDialer, VotingStore};
use crate::node::{NodeInfo, NodeVotingStatus};
use crate::state::ElectionResult;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

const JITTER_MIN_MS: u64 = 100;
const JITTER_MAX_MS: u64 = 600;

/// A visible sibling and the connection opened to it during the canvass, kept alive so
/// the vote-request pass in step 7 can reuse it instead of redialing.
pub struct VisiblePeer {
    pub info: NodeInfo,
    pub store: Box<dyn VotingStore>,
}

/// What one election round produced: the outcome, the refreshed sibling set (used by
/// the Failover Orchestrator for the tie-break poll and follower notification), and the
/// electoral term this node claimed (if it got that far).
pub struct ElectionOutcome {
    pub result: ElectionResult,
    pub siblings: Vec<NodeInfo>,
    pub electoral_term: Option<u64>,
}

/// Runs one election round to completion. `self_info` is this node's own snapshot;
/// `lost_upstream_id` is excluded from the sibling canvass: a node that just dropped off
/// is never a valid candidate to vote for or against.
pub async fn run_election(
    own_store: &dyn VotingStore,
    dialer: &dyn PeerDialer,
    self_info: &NodeInfo,
    lost_upstream_id: i32,
) -> anyhow::Result<ElectionOutcome> {
    // 1. Desynchronize simultaneous starters.
    let jitter_ms = rand::thread_rng().gen_range(JITTER_MIN_MS..=JITTER_MAX_MS);
    debug!("do_election: sleeping {}ms", jitter_ms);
    sleep(Duration::from_millis(jitter_ms)).await;

    // 2. Another node already began and we owe it a vote.
    if own_store.get_voting_status().await? == NodeVotingStatus::VoteRequestReceived {
        debug!("vote request already received, not candidate");
        return Ok(ElectionOutcome {
            result: ElectionResult::NotCandidate,
            siblings: Vec::new(),
            electoral_term: None,
        });
    }

    // 3. Claim candidacy.
    let electoral_term = own_store.set_voting_status_initiated().await?;

    // 4. Refresh active siblings, excluding self and the lost upstream.
    let siblings = own_store
        .get_active_siblings(self_info.node_id, lost_upstream_id)
        .await?;

    if siblings.is_empty() {
        debug!("no other nodes - we win by default");
        return Ok(ElectionOutcome {
            result: ElectionResult::Won,
            siblings,
            electoral_term: Some(electoral_term),
        });
    }

    // 5. Canvass: announce candidature to each sibling.
    let mut visible: Vec<VisiblePeer> = Vec::new();
    let mut refreshed_siblings: Vec<NodeInfo> = Vec::new();
    for mut sibling in siblings {
        let Some(store) = dialer.dial(&sibling).await else {
            sibling.is_visible = false;
            refreshed_siblings.push(sibling);
            continue;
        };

        match store.announce_candidature(self_info, electoral_term).await {
            Ok(true) => {
                sibling.is_visible = true;
                refreshed_siblings.push(sibling.clone());
                visible.push(VisiblePeer { info: sibling, store });
            }
            Ok(false) => {
                debug!("node {} is candidate, withdrawing", sibling.node_id);
                own_store.reset_voting_status().await?;
                refreshed_siblings.push(sibling);
                return Ok(ElectionOutcome {
                    result: ElectionResult::NotCandidate,
                    siblings: refreshed_siblings,
                    electoral_term: Some(electoral_term),
                });
            }
            Err(_) => {
                sibling.is_visible = false;
                refreshed_siblings.push(sibling);
            }
        }
    }

    // Visible node count starts at 1 for self.
    let visible_nodes = visible.len() + 1;

    // 6. Our own replication position.
    let self_lsn = own_store.get_last_wal_receive_lsn().await?;

    // 7. Request votes from every visible sibling.
    let mut votes_for_me = 0usize;
    let mut other_node_is_ahead = false;
    for peer in &visible {
        if peer.store.request_vote(self_info, electoral_term).await.unwrap_or(false) {
            votes_for_me += 1;
        }
        if let Ok(peer_lsn) = peer.store.get_last_wal_receive_lsn().await
            && peer_lsn > self_lsn
        {
            other_node_is_ahead = true;
        }
    }

    // 8. Vote for self unless someone visible is strictly ahead.
    if !other_node_is_ahead {
        votes_for_me += 1;
    }

    // 9. Unanimity among visible peers, not strict majority: a single dissenting
    // reachable sibling blocks the win.
    let result = if votes_for_me == visible_nodes {
        ElectionResult::Won
    } else {
        ElectionResult::Lost
    };

    Ok(ElectionOutcome {
        result,
        siblings: refreshed_siblings,
        electoral_term: Some(electoral_term),
    })
}

/// The tie-break / best-candidate poll: ranks `self_info` alongside `siblings` by
/// highest LSN, then highest priority, then lowest node_id. Given identical sibling sets
/// and attributes every node computes the same winner.
pub fn select_best_candidate<'a>(self_info: &'a NodeInfo, siblings: &'a [NodeInfo]) -> &'a NodeInfo {
    let mut best = self_info;
    for candidate in siblings {
        if candidate.candidacy_rank() > best.candidacy_rank() {
            best = candidate;
        }
    }
    best
}
