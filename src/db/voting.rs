// src/db/voting.rs

//! The `VotingStore` capability: the database-backed voting and directory primitives,
//! modeled as a trait so the Election Engine and Failover Orchestrator can be exercised
//! against an in-memory fake instead of a live cluster.

use crate::db::supervisor::ConnectionHandle;
use crate::node::{Lsn, NodeInfo, NodeRole, NodeVotingStatus};
use async_trait::async_trait;
use tokio_postgres::Client;

/// One connection's view of the shared, database-resident voting and directory state.
/// Each implementor is bound to a single live connection — to the local node for
/// directory reads and our own voting status, or to a peer's node during an election,
/// each speaking through a different live connection.
#[async_trait]
pub trait VotingStore: Send + Sync {
    async fn get_node_record(&self, node_id: i32) -> anyhow::Result<Option<NodeInfo>>;

    async fn get_active_siblings(
        &self,
        self_id: i32,
        exclude_upstream_id: i32,
    ) -> anyhow::Result<Vec<NodeInfo>>;

    /// The cluster's current primary, if one is registered and active. Used during
    /// promotion reconciliation to check whether an upstream thought lost has in fact
    /// reappeared.
    async fn get_primary(&self) -> anyhow::Result<Option<NodeInfo>>;

    async fn get_voting_status(&self) -> anyhow::Result<NodeVotingStatus>;

    /// Atomically marks self as candidate; returns the newly assigned electoral term.
    async fn set_voting_status_initiated(&self) -> anyhow::Result<u64>;

    /// `true` if the peer accepts this node as candidate; `false` if the peer already
    /// declared itself candidate, in which case this node must withdraw.
    async fn announce_candidature(&self, candidate: &NodeInfo, term: u64) -> anyhow::Result<bool>;

    /// `true` if the peer grants a vote.
    async fn request_vote(&self, candidate: &NodeInfo, term: u64) -> anyhow::Result<bool>;

    /// `Some(id)` if some peer has written a "new primary is X" notification.
    async fn get_new_primary(&self) -> anyhow::Result<Option<i32>>;

    async fn notify_follow_primary(&self, target_id: i32) -> anyhow::Result<()>;

    /// Clears election scratch state for a new round.
    async fn reset_voting_status(&self) -> anyhow::Result<()>;

    async fn get_last_wal_receive_lsn(&self) -> anyhow::Result<Lsn>;

    /// `true` if this connection currently identifies a primary (not in recovery).
    async fn is_primary(&self) -> anyhow::Result<bool>;

    /// Closes the underlying connection now, if this store owns one. Borrowed stores
    /// (`PgVotingStore`, peer connections opened for a single check) and the in-memory
    /// fakes have nothing of their own to close and use this default no-op.
    async fn close_local(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The production `VotingStore`, issuing parameterized SQL over a live
/// `tokio_postgres::Client`. The exact table layout is a collaborator's responsibility
/// this implementation assumes a `repmgr.nodes` / `repmgr.voting_status` schema and a
/// matching set of `repmgr.*` helper functions, mirroring the table and function names a
/// repmgr-compatible cluster already exposes.
pub struct PgVotingStore<'a> {
    client: &'a Client,
}

impl<'a> PgVotingStore<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn row_to_node_info(row: &tokio_postgres::Row) -> NodeInfo {
        let role_str: String = row.get("type");
        NodeInfo {
            node_id: row.get("node_id"),
            node_name: row.get("node_name"),
            role: match role_str.as_str() {
                "primary" => NodeRole::Primary,
                "standby" => NodeRole::Standby,
                "witness" => NodeRole::Witness,
                "bdr" => NodeRole::Bdr,
                _ => NodeRole::Unknown,
            },
            upstream_node_id: row.get("upstream_node_id"),
            conninfo: row.get("conninfo"),
            priority: row.get("priority"),
            active: row.get("active"),
            last_wal_receive_lsn: Lsn(row.get::<_, i64>("last_wal_receive_lsn") as u64),
            is_visible: false,
        }
    }
}

#[async_trait]
impl<'a> VotingStore for PgVotingStore<'a> {
    async fn get_node_record(&self, node_id: i32) -> anyhow::Result<Option<NodeInfo>> {
        let row = self
            .client
            .query_opt("SELECT * FROM repmgr.nodes WHERE node_id = $1", &[&node_id])
            .await?;
        Ok(row.as_ref().map(Self::row_to_node_info))
    }

    async fn get_active_siblings(
        &self,
        self_id: i32,
        exclude_upstream_id: i32,
    ) -> anyhow::Result<Vec<NodeInfo>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM repmgr.nodes \
                 WHERE active = true AND node_id != $1 AND node_id != $2 AND type = 'standby'",
                &[&self_id, &exclude_upstream_id],
            )
            .await?;
        Ok(rows.iter().map(Self::row_to_node_info).collect())
    }

    async fn get_primary(&self) -> anyhow::Result<Option<NodeInfo>> {
        let row = self
            .client
            .query_opt(
                "SELECT * FROM repmgr.nodes WHERE type = 'primary' AND active = true LIMIT 1",
                &[],
            )
            .await?;
        Ok(row.as_ref().map(Self::row_to_node_info))
    }

    async fn get_voting_status(&self) -> anyhow::Result<NodeVotingStatus> {
        let row = self
            .client
            .query_opt("SELECT state FROM repmgr.voting_status WHERE node_id = pg_catalog.current_setting('repmgr.node_id')::int", &[])
            .await?;
        Ok(match row.as_ref().map(|r| r.get::<_, String>("state")) {
            Some(s) if s == "vote-request-received" => NodeVotingStatus::VoteRequestReceived,
            Some(s) if s == "vote-initiated" => NodeVotingStatus::VoteInitiated,
            Some(s) if s == "no-vote" => NodeVotingStatus::NoVote,
            _ => NodeVotingStatus::Unknown,
        })
    }

    async fn set_voting_status_initiated(&self) -> anyhow::Result<u64> {
        let row = self
            .client
            .query_one(
                "SELECT repmgr.set_voting_status_initiated() AS electoral_term",
                &[],
            )
            .await?;
        Ok(row.get::<_, i64>("electoral_term") as u64)
    }

    async fn announce_candidature(&self, candidate: &NodeInfo, term: u64) -> anyhow::Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT repmgr.announce_candidature($1, $2) AS accepted",
                &[&candidate.node_id, &(term as i64)],
            )
            .await?;
        Ok(row.get("accepted"))
    }

    async fn request_vote(&self, candidate: &NodeInfo, term: u64) -> anyhow::Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT repmgr.request_vote($1, $2) AS granted",
                &[&candidate.node_id, &(term as i64)],
            )
            .await?;
        let granted: i32 = row.get("granted");
        Ok(granted == 1)
    }

    async fn get_new_primary(&self) -> anyhow::Result<Option<i32>> {
        let row = self
            .client
            .query_opt("SELECT repmgr.get_new_primary() AS node_id", &[])
            .await?;
        Ok(row.and_then(|r| r.get::<_, Option<i32>>("node_id")))
    }

    async fn notify_follow_primary(&self, target_id: i32) -> anyhow::Result<()> {
        self.client
            .execute("SELECT repmgr.notify_follow_primary($1)", &[&target_id])
            .await?;
        Ok(())
    }

    async fn reset_voting_status(&self) -> anyhow::Result<()> {
        self.client
            .execute("SELECT repmgr.reset_voting_status()", &[])
            .await?;
        Ok(())
    }

    async fn get_last_wal_receive_lsn(&self) -> anyhow::Result<Lsn> {
        let row = self
            .client
            .query_one(
                "SELECT pg_catalog.pg_last_wal_receive_lsn() - '0/0'::pg_lsn AS lsn",
                &[],
            )
            .await?;
        Ok(Lsn(row.get::<_, i64>("lsn") as u64))
    }

    async fn is_primary(&self) -> anyhow::Result<bool> {
        let row = self
            .client
            .query_one("SELECT NOT pg_catalog.pg_is_in_recovery() AS is_primary", &[])
            .await?;
        Ok(row.get("is_primary"))
    }
}

/// A `VotingStore` that owns its `ConnectionHandle` outright, rather than borrowing a
/// `&Client`. Used wherever a store must be boxed as a trait object with no fixed
/// lifetime — transient peer connections opened mid-election, and the connection opened
/// to a promotion/follow target — so the connection and its driver task are dropped
/// together with the store. The handle sits behind a `tokio::sync::Mutex` so
/// `close_local` can drop it through a shared `&self`: the Failover Orchestrator holds
/// this store for an entire cycle but must close the real connection partway through,
/// before the follow command runs, while still being able to read through the same
/// store earlier and later in that cycle. Delegates every read to `PgVotingStore` over
/// the locked client rather than duplicating the query bodies.
pub struct OwnedPgVotingStore {
    handle: tokio::sync::Mutex<Option<ConnectionHandle>>,
}

impl OwnedPgVotingStore {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            handle: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// Hands back the connection if it's still open, for a caller that owned this store
    /// for one cycle and wants to keep the connection afterward.
    pub fn into_handle(self) -> Option<ConnectionHandle> {
        self.handle.into_inner()
    }

    async fn locked(&self) -> anyhow::Result<tokio::sync::MutexGuard<'_, Option<ConnectionHandle>>> {
        let guard = self.handle.lock().await;
        if guard.is_none() {
            anyhow::bail!("local connection is closed");
        }
        Ok(guard)
    }
}

#[async_trait]
impl VotingStore for OwnedPgVotingStore {
    async fn get_node_record(&self, node_id: i32) -> anyhow::Result<Option<NodeInfo>> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).get_node_record(node_id).await
    }

    async fn get_active_siblings(
        &self,
        self_id: i32,
        exclude_upstream_id: i32,
    ) -> anyhow::Result<Vec<NodeInfo>> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client)
            .get_active_siblings(self_id, exclude_upstream_id)
            .await
    }

    async fn get_primary(&self) -> anyhow::Result<Option<NodeInfo>> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).get_primary().await
    }

    async fn get_voting_status(&self) -> anyhow::Result<NodeVotingStatus> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).get_voting_status().await
    }

    async fn set_voting_status_initiated(&self) -> anyhow::Result<u64> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).set_voting_status_initiated().await
    }

    async fn announce_candidature(&self, candidate: &NodeInfo, term: u64) -> anyhow::Result<bool> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client)
            .announce_candidature(candidate, term)
            .await
    }

    async fn request_vote(&self, candidate: &NodeInfo, term: u64) -> anyhow::Result<bool> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).request_vote(candidate, term).await
    }

    async fn get_new_primary(&self) -> anyhow::Result<Option<i32>> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).get_new_primary().await
    }

    async fn notify_follow_primary(&self, target_id: i32) -> anyhow::Result<()> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).notify_follow_primary(target_id).await
    }

    async fn reset_voting_status(&self) -> anyhow::Result<()> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).reset_voting_status().await
    }

    async fn get_last_wal_receive_lsn(&self) -> anyhow::Result<Lsn> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).get_last_wal_receive_lsn().await
    }

    async fn is_primary(&self) -> anyhow::Result<bool> {
        let guard = self.locked().await?;
        PgVotingStore::new(&guard.as_ref().unwrap().client).is_primary().await
    }

    async fn close_local(&self) -> anyhow::Result<()> {
        *self.handle.lock().await = None;
        Ok(())
    }
}
