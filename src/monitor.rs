// src/monitor.rs

//! The Role Monitor: the outer endless loop, dispatching to `PrimaryMonitor` or
//! `StandbyMonitor` depending on the local node's current role, per `spec.md` §4.6.

use crate::cli::Cli;
use crate::config::{Config, FailoverMode};
use crate::db::{ConnectionSupervisor, Liveness, OwnedPgVotingStore, PeerDialer, PgVotingStore, VotingStore};
use crate::directory::NodeDirectory;
use crate::error::RepmgrdError;
use crate::election;
use crate::events::{EventName, EventRecorder};
use crate::executor::Executor;
use crate::failover;
use crate::node::{NodeInfo, NodeRole};
use crate::state::{FailoverState, LocalState};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Registry, reload};

const PROBE_PERIOD: Duration = Duration::from_secs(1);

/// Fails fast at startup when an inactive node is configured for automatic failover.
/// Invariant 2 in `spec.md` §8: such a node must not start monitoring at all; under
/// manual failover it is allowed to monitor passively (it simply never becomes a
/// candidate, since `get_active_siblings` excludes it).
pub fn validate_active_for_automatic(node: &NodeInfo, mode: FailoverMode) -> Result<(), RepmgrdError> {
    if mode == FailoverMode::Automatic && !node.active {
        return Err(RepmgrdError::InactiveNodeAutomatic(node.node_id));
    }
    Ok(())
}

/// `true` once `elapsed` has reached `interval`; `interval <= 0` disables the heartbeat
/// line entirely, per `spec.md` §6 (`log_status_interval`).
pub fn heartbeat_due(elapsed: Duration, interval_secs: i64) -> bool {
    interval_secs > 0 && elapsed.as_secs() as i64 >= interval_secs
}

/// Drives the outer Role Monitor loop to termination (SIGINT/SIGTERM observed via
/// `state.signals`). Re-dispatches on every iteration in case the previous one changed
/// the local node's role (promotion, follow).
#[allow(clippy::too_many_arguments)]
pub async fn run(
    mut state: LocalState,
    config: &Config,
    recorder: &EventRecorder,
    supervisor: &ConnectionSupervisor,
    dialer: &dyn PeerDialer,
    executor: &dyn Executor,
    cli: &Cli,
    reload_handle: &reload::Handle<EnvFilter, Registry>,
) -> anyhow::Result<()> {
    loop {
        if state.signals.should_terminate() {
            info!("termination requested, Role Monitor exiting");
            terminate_cleanup(&mut state, config).await;
            return Ok(());
        }

        if state.signals.take_reload() {
            apply_log_level_reload(cli, reload_handle);
        }

        reset_own_voting_status(&state).await;

        match state.self_info.role {
            NodeRole::Primary => {
                primary_monitor(&mut state, config, recorder, supervisor).await?;
            }
            NodeRole::Standby => {
                standby_monitor(&mut state, config, recorder, supervisor, dialer, executor).await?;
            }
            other => {
                anyhow::bail!("node role {:?} is not implemented by this daemon", other);
            }
        }
    }
}

/// Cancellation per `spec.md` §5: any in-flight query on the primary connection is
/// canceled first, bounded by `primary_response_timeout`, before both owned connections
/// are dropped.
async fn terminate_cleanup(state: &mut LocalState, config: &Config) {
    if let Some(client) = state.primary_client() {
        let cancel_token = client.cancel_token();
        if tokio::time::timeout(config.primary_response_timeout, cancel_token.cancel_query(tokio_postgres::NoTls))
            .await
            .is_err()
        {
            warn!("timed out canceling in-flight query on primary connection during shutdown");
        }
    }
    state.close_connections();
}

/// Re-reads the config file's `log_level` (still subordinate to any `-v`/`-L` CLI
/// override, per `Cli::effective_log_level`) and applies it through the retained reload
/// handle. This is the only effect of SIGHUP; nothing else about the running
/// configuration is re-read.
fn apply_log_level_reload(cli: &Cli, reload_handle: &reload::Handle<EnvFilter, Registry>) {
    let fresh = match Config::from_file(&cli.config_file) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("SIGHUP reload: failed to reread config file \"{}\": {}", cli.config_file, e);
            return;
        }
    };
    let level = cli.effective_log_level(&fresh.log_level);
    match reload_handle.reload(EnvFilter::new(&level)) {
        Ok(()) => info!("reloaded log level to \"{}\" after SIGHUP", level),
        Err(e) => warn!("failed to apply reloaded log level: {}", e),
    }
}

async fn reset_own_voting_status(state: &LocalState) {
    if let Some(handle) = &state.local_conn {
        let store = PgVotingStore::new(&handle.client);
        if let Err(e) = store.reset_voting_status().await {
            warn!("failed to reset voting status: {}", e);
        }
    }
}

/// `spec.md` §4.6 PrimaryMonitor: probes local liveness every second, reconnects on
/// loss, emits a heartbeat line at `log_status_interval`. Returns only when the node's
/// role has changed underneath it (there is no failover path from this side; a lost
/// primary is detected and acted on by its standbys, not by the primary watching
/// itself) or the process is terminating.
async fn primary_monitor(
    state: &mut LocalState,
    config: &Config,
    recorder: &EventRecorder,
    supervisor: &ConnectionSupervisor,
) -> anyhow::Result<()> {
    if !state.startup_event_logged {
        recorder
            .record(
                state.local_conn.as_ref().map(|h| &h.client),
                state.self_info.node_id,
                EventName::RepmgrdStart,
                true,
                "repmgrd started monitoring as primary",
            )
            .await;
        state.startup_event_logged = true;
    }

    let mut last_heartbeat = Instant::now();

    loop {
        if state.signals.should_terminate() {
            return Ok(());
        }

        let up = match &state.local_conn {
            Some(handle) => handle.probe().await,
            None => false,
        };

        if !up {
            state.local_conn = None;
            let (handle, liveness) = supervisor
                .try_reconnect(&config.conninfo, state.self_info.node_id, recorder)
                .await;
            state.local_conn = handle;
            if liveness == Liveness::Down {
                warn!("local node still unreachable, will keep retrying");
            }
        }

        if heartbeat_due(last_heartbeat.elapsed(), config.log_status_interval) {
            info!("still-alive: monitoring node {} as primary", state.self_info.node_id);
            last_heartbeat = Instant::now();
        }

        if let Some(handle) = &state.local_conn {
            let store = PgVotingStore::new(&handle.client);
            if let Ok(Some(fresh)) = store.get_node_record(state.self_info.node_id).await
                && fresh.role != state.self_info.role
            {
                info!("local node role changed to {:?}, returning to Role Monitor", fresh.role);
                state.self_info = fresh;
                return Ok(());
            }
        }

        sleep(PROBE_PERIOD).await;
    }
}

/// `spec.md` §4.6 StandbyMonitor: probes the upstream every second; on confirmed loss,
/// runs one election round and drives the Failover Orchestrator. Returns to the Role
/// Monitor as soon as the Orchestrator reaches a terminal state so the outer loop
/// re-dispatches on the (possibly changed) role.
async fn standby_monitor(
    state: &mut LocalState,
    config: &Config,
    recorder: &EventRecorder,
    supervisor: &ConnectionSupervisor,
    dialer: &dyn PeerDialer,
    executor: &dyn Executor,
) -> anyhow::Result<()> {
    let upstream_id = state
        .self_info
        .upstream_node_id
        .ok_or_else(|| anyhow::anyhow!("standby node {} has no upstream_node_id", state.self_info.node_id))?;

    if state.upstream_conn.is_none() {
        let upstream_info = {
            let local = state
                .local_conn
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no local connection to read upstream record"))?;
            let store = PgVotingStore::new(&local.client);
            let directory = NodeDirectory::new(&store);
            directory
                .get_by_id(upstream_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no node record found for upstream node {}", upstream_id))?
        };
        state.upstream_conn = supervisor.open(&upstream_info.conninfo, false).await.ok();
    }

    if !state.startup_event_logged {
        recorder
            .record(
                state.local_conn.as_ref().map(|h| &h.client),
                state.self_info.node_id,
                EventName::RepmgrdStart,
                true,
                "repmgrd started monitoring as standby",
            )
            .await;
        state.startup_event_logged = true;
    }

    loop {
        if state.signals.should_terminate() {
            return Ok(());
        }

        // Best-effort local reconnect; never fatal to the standby loop.
        let local_up = match &state.local_conn {
            Some(handle) => handle.probe().await,
            None => false,
        };
        if !local_up {
            state.local_conn = None;
            let (handle, _) = supervisor
                .try_reconnect(&config.conninfo, state.self_info.node_id, recorder)
                .await;
            state.local_conn = handle;
        }

        let upstream_up = match &state.upstream_conn {
            Some(handle) => handle.probe().await,
            None => false,
        };

        if upstream_up {
            sleep(PROBE_PERIOD).await;
            continue;
        }

        state.upstream_conn = None;
        let (handle, liveness) = supervisor
            .try_reconnect(
                &upstream_conninfo(state, upstream_id).await,
                state.self_info.node_id,
                recorder,
            )
            .await;
        if liveness == Liveness::Up {
            state.upstream_conn = handle;
            sleep(PROBE_PERIOD).await;
            continue;
        }

        info!("upstream {} confirmed lost, beginning election", upstream_id);
        run_failover_cycle(state, config, recorder, dialer, executor, upstream_id).await?;
        return Ok(());
    }
}

async fn upstream_conninfo(state: &LocalState, upstream_id: i32) -> String {
    if let Some(local) = &state.local_conn {
        let store = PgVotingStore::new(&local.client);
        if let Ok(Some(info)) = store.get_node_record(upstream_id).await {
            return info.conninfo;
        }
    }
    state
        .standby_nodes
        .iter()
        .find(|n| n.node_id == upstream_id)
        .map(|n| n.conninfo.clone())
        .unwrap_or_default()
}

/// Runs the election, then the Failover Orchestrator, reconciling their outcome into
/// `state`: refreshed `self_info`, new `upstream_node_id`/`upstream_conn`, and
/// `failover_state`.
async fn run_failover_cycle(
    state: &mut LocalState,
    config: &Config,
    recorder: &EventRecorder,
    dialer: &dyn PeerDialer,
    executor: &dyn Executor,
    lost_upstream_id: i32,
) -> anyhow::Result<()> {
    let Some(local_handle) = state.local_conn.take() else {
        warn!("no local connection available, cannot run election this cycle");
        state.failover_state = FailoverState::LocalNodeFailure;
        return Ok(());
    };
    // Owning the handle for the whole cycle (rather than borrowing `state.local_conn`)
    // lets `follow_new_primary` close it partway through, before the follow command
    // restarts the local database, while every earlier/later read in this same cycle
    // still goes through the same store.
    let own_store = OwnedPgVotingStore::new(local_handle);

    let outcome = election::run_election(&own_store, dialer, &state.self_info, lost_upstream_id).await?;
    state.standby_nodes = outcome.siblings.clone();

    let promote_command = config
        .effective_promote_command()
        .unwrap_or("")
        .to_string();
    let follow_command = config.follow_command.clone().unwrap_or_default();

    let failover_outcome = failover::run(
        outcome.result,
        &state.self_info,
        &outcome.siblings,
        lost_upstream_id,
        &own_store,
        dialer,
        executor,
        recorder,
        &promote_command,
        &follow_command,
        config.promote_delay,
        config.wait_primary_timeout,
    )
    .await?;

    state.failover_state = failover_outcome.state;
    if let Some(refreshed) = failover_outcome.updated_self {
        state.self_info = refreshed;
    }
    if let Some(new_upstream) = failover_outcome.new_upstream_id {
        state.self_info.upstream_node_id = Some(new_upstream);
    }
    // `follow_new_primary` already closed the local connection itself, before running
    // the follow command; `into_handle` reflects that (`None`) for `FollowedNewPrimary`.
    // `FollowingOriginalPrimary` never ran a follow command at all, but per `spec.md`
    // §3's "connections... always closed before a follow action" we still treat resuming
    // standby monitoring under the (possibly stale) original upstream as a fresh start.
    state.local_conn = own_store.into_handle();
    if matches!(
        state.failover_state,
        FailoverState::FollowedNewPrimary | FailoverState::FollowingOriginalPrimary
    ) {
        state.local_conn = None;
    }
    state.upstream_conn = None;
    state.standby_nodes.clear();

    Ok(())
}
