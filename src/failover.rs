// src/failover.rs

//! The Failover Orchestrator: the state machine that runs once the Standby Monitor has
//! declared the upstream lost, driving promotion or re-anchoring to whatever node the
//! cluster agrees on.

use crate::db::{PeerDialer, VotingStore};
use crate::election::select_best_candidate;
use crate::events::{EventName, EventRecorder};
use crate::executor::Executor;
use crate::node::NodeInfo;
use crate::state::{ElectionResult, FailoverState};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const WAIT_POLL_PERIOD: Duration = Duration::from_secs(1);

/// Where the state machine landed. `updated_self` carries a refreshed `NodeInfo` when
/// promotion or follow succeeded (the local database now reports a different role or
/// upstream); `new_upstream_id` is the id the Standby Monitor should resume watching,
/// present for every non-`Promoted` terminal state that implies one.
pub struct FailoverOutcome {
    pub state: FailoverState,
    pub updated_self: Option<NodeInfo>,
    pub new_upstream_id: Option<i32>,
}

/// Runs the orchestrator to a terminal state, starting from the outcome of one election
/// round. `siblings` is the (stale) sibling list the election refreshed, reused for
/// follower notification without a second directory read.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    election_result: ElectionResult,
    self_info: &NodeInfo,
    siblings: &[NodeInfo],
    lost_upstream_id: i32,
    own_store: &dyn VotingStore,
    dialer: &dyn PeerDialer,
    executor: &dyn Executor,
    recorder: &EventRecorder,
    promote_command: &str,
    follow_command: &str,
    promote_delay: Duration,
    wait_primary_timeout: Duration,
) -> anyhow::Result<FailoverOutcome> {
    let mut updated_self = None;
    let mut new_upstream_id = None;

    let mut state = match election_result {
        ElectionResult::Won => {
            let (state, refreshed) = promote_self(
                own_store,
                executor,
                recorder,
                self_info,
                lost_upstream_id,
                promote_command,
                promote_delay,
            )
            .await?;
            updated_self = refreshed;
            state
        }
        ElectionResult::Lost => {
            let best = select_best_candidate(self_info, siblings).clone();
            if best.node_id == self_info.node_id {
                let (state, refreshed) = promote_self(
                    own_store,
                    executor,
                    recorder,
                    self_info,
                    lost_upstream_id,
                    promote_command,
                    promote_delay,
                )
                .await?;
                updated_self = refreshed;
                state
            } else {
                match dialer.dial(&best).await {
                    Some(store) => match store.notify_follow_primary(best.node_id).await {
                        Ok(()) => FailoverState::WaitingNewPrimary,
                        Err(e) => {
                            warn!("failed to notify best candidate {}: {}", best.node_id, e);
                            FailoverState::NodeNotificationError
                        }
                    },
                    None => {
                        warn!("best candidate {} unreachable for notification", best.node_id);
                        FailoverState::NodeNotificationError
                    }
                }
            }
        }
        ElectionResult::NotCandidate => FailoverState::WaitingNewPrimary,
    };

    loop {
        state = match state {
            FailoverState::WaitingNewPrimary => match wait_for_new_primary(own_store, wait_primary_timeout).await? {
                Some(x) if x == lost_upstream_id => {
                    new_upstream_id = Some(lost_upstream_id);
                    FailoverState::FollowingOriginalPrimary
                }
                Some(x) if x == self_info.node_id => {
                    let (state, refreshed) = promote_self(
                        own_store,
                        executor,
                        recorder,
                        self_info,
                        lost_upstream_id,
                        promote_command,
                        promote_delay,
                    )
                    .await?;
                    updated_self = refreshed;
                    state
                }
                Some(x) => {
                    let (state, refreshed) = follow_new_primary(
                        x,
                        lost_upstream_id,
                        self_info.node_id,
                        own_store,
                        dialer,
                        executor,
                        recorder,
                        follow_command,
                    )
                    .await?;
                    if state == FailoverState::FollowedNewPrimary {
                        new_upstream_id = Some(x);
                        updated_self = refreshed;
                    }
                    state
                }
                None => FailoverState::NoNewPrimary,
            },
            FailoverState::Promoted => {
                notify_followers(self_info.node_id, siblings, dialer).await;
                return Ok(FailoverOutcome {
                    state: FailoverState::Promoted,
                    updated_self,
                    new_upstream_id: None,
                });
            }
            FailoverState::PrimaryReappeared => {
                notify_followers(lost_upstream_id, siblings, dialer).await;
                return Ok(FailoverOutcome {
                    state: FailoverState::PrimaryReappeared,
                    updated_self,
                    new_upstream_id: Some(lost_upstream_id),
                });
            }
            terminal => {
                return Ok(FailoverOutcome {
                    state: terminal,
                    updated_self,
                    new_upstream_id,
                });
            }
        };
    }
}

/// Executes the promotion command and reconciles its outcome. Never returns an error
/// for command failure — that is expressed as `FailoverState::PromotionFailed` or
/// `PrimaryReappeared`, per the state machine's own error-propagation policy. An error
/// launching the command at all (not the command's exit code) is treated as
/// `LocalNodeFailure`, since it indicates this node cannot reliably act at all.
async fn promote_self(
    own_store: &dyn VotingStore,
    executor: &dyn Executor,
    recorder: &EventRecorder,
    self_info: &NodeInfo,
    failed_upstream_id: i32,
    promote_command: &str,
    promote_delay: Duration,
) -> anyhow::Result<(FailoverState, Option<NodeInfo>)> {
    if !promote_delay.is_zero() {
        sleep(promote_delay).await;
    }

    info!("promoting self (node {}) to primary", self_info.node_id);
    let exit = match executor.run(promote_command).await {
        Ok(code) => code,
        Err(e) => {
            warn!("could not execute promote command: {}", e);
            return Ok((FailoverState::LocalNodeFailure, None));
        }
    };

    if exit == Some(0) {
        let refreshed = own_store.get_node_record(self_info.node_id).await?;
        recorder
            .record(
                None,
                self_info.node_id,
                EventName::RepmgrdFailoverPromote,
                true,
                "promotion succeeded",
            )
            .await;
        return Ok((FailoverState::Promoted, refreshed));
    }

    warn!("promote command exited with {:?}", exit);
    match own_store.get_primary().await? {
        Some(primary) if primary.node_id == failed_upstream_id => {
            recorder
                .record(
                    None,
                    self_info.node_id,
                    EventName::RepmgrdFailoverAbort,
                    false,
                    "original primary reappeared during promotion",
                )
                .await;
            Ok((FailoverState::PrimaryReappeared, None))
        }
        _ => Ok((FailoverState::PromotionFailed, None)),
    }
}

/// Re-anchors this node onto `new_id`. Verifies the target actually reports itself as
/// primary before running `follow_command`, since nominating a node that hasn't yet
/// promoted would otherwise re-anchor onto a standby.
#[allow(clippy::too_many_arguments)]
async fn follow_new_primary(
    new_id: i32,
    failed_upstream_id: i32,
    self_id: i32,
    own_store: &dyn VotingStore,
    dialer: &dyn PeerDialer,
    executor: &dyn Executor,
    recorder: &EventRecorder,
    follow_command: &str,
) -> anyhow::Result<(FailoverState, Option<NodeInfo>)> {
    let Some(new_primary) = own_store.get_node_record(new_id).await? else {
        warn!("new primary {} has no node record", new_id);
        return Ok((FailoverState::FollowFail, None));
    };
    let failed_primary = own_store.get_node_record(failed_upstream_id).await?;

    // The follow command restarts the local database; close the local connection now,
    // before it runs, rather than reading through it once the restart has already
    // invalidated it.
    own_store.close_local().await?;

    let Some(candidate_store) = dialer.dial(&new_primary).await else {
        warn!("new primary {} is unreachable", new_id);
        return Ok((FailoverState::FollowFail, None));
    };

    if !candidate_store.is_primary().await.unwrap_or(false) {
        warn!("node {} does not yet report itself as primary", new_id);
        return Ok((FailoverState::FollowFail, None));
    }

    info!("executing follow command to re-anchor on node {}", new_id);
    let exit = match executor.run(follow_command).await {
        Ok(code) => code,
        Err(e) => {
            warn!("could not execute follow command: {}", e);
            return Ok((FailoverState::FollowFail, None));
        }
    };

    if exit == Some(0) {
        let refreshed_self = candidate_store.get_node_record(self_id).await?;
        recorder
            .record(
                None,
                self_id,
                EventName::RepmgrdFailoverFollow,
                true,
                &format!("now following node {}", new_id),
            )
            .await;
        return Ok((FailoverState::FollowedNewPrimary, refreshed_self));
    }

    warn!("follow command exited with {:?}", exit);
    let Some(old_primary) = failed_primary else {
        return Ok((FailoverState::FollowFail, None));
    };
    match dialer.dial(&old_primary).await {
        Some(store) if store.is_primary().await.unwrap_or(false) => {
            Ok((FailoverState::PrimaryReappeared, None))
        }
        _ => Ok((FailoverState::FollowFail, None)),
    }
}

/// Polls `get_new_primary` once per second until `timeout` elapses (default 60s, per
/// `spec.md` §4.5, configurable via `wait_primary_timeout`).
async fn wait_for_new_primary(own_store: &dyn VotingStore, timeout: Duration) -> anyhow::Result<Option<i32>> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(id) = own_store.get_new_primary().await? {
            return Ok(Some(id));
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        sleep(WAIT_POLL_PERIOD).await;
    }
}

/// Notifies every sibling to follow `target_id`. Unreachable siblings are skipped with
/// a warning and never retried — they rediscover the new topology on their own next
/// monitoring tick.
async fn notify_followers(target_id: i32, siblings: &[NodeInfo], dialer: &dyn PeerDialer) {
    for sibling in siblings {
        match dialer.dial(sibling).await {
            Some(store) => {
                if let Err(e) = store.notify_follow_primary(target_id).await {
                    warn!("failed to notify node {} to follow {}: {}", sibling.node_id, target_id, e);
                }
            }
            None => {
                warn!("node {} unreachable, skipping follower notification", sibling.node_id);
            }
        }
    }
}
