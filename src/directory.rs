// src/directory.rs

//! The Node Directory: an in-memory cache of peer records, refreshed from the local
//! database on demand. Never mutates; the database is the source of truth — this is a
//! thin read-through adapter over a `VotingStore`, not a cache with its own
//! invalidation policy.

use crate::db::VotingStore;
use crate::node::NodeInfo;

pub struct NodeDirectory<'a> {
    store: &'a dyn VotingStore,
}

impl<'a> NodeDirectory<'a> {
    pub fn new(store: &'a dyn VotingStore) -> Self {
        Self { store }
    }

    pub async fn get_by_id(&self, node_id: i32) -> anyhow::Result<Option<NodeInfo>> {
        self.store.get_node_record(node_id).await
    }

    /// The current node's active siblings: excludes `self_id` and the upstream being
    /// lost.
    pub async fn get_active_siblings(
        &self,
        self_id: i32,
        exclude_upstream_id: i32,
    ) -> anyhow::Result<Vec<NodeInfo>> {
        self.store
            .get_active_siblings(self_id, exclude_upstream_id)
            .await
    }
}
