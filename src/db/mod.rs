// src/db/mod.rs

//! Everything that talks to a node's database: connection supervision and the
//! `VotingStore` capability (production and fake implementations).

pub mod fake;
pub mod supervisor;
pub mod voting;

pub mod dialer;

pub use dialer::{FakePeerDialer, PeerDialer, PgPeerDialer};
pub use fake::{FakeCluster, FakeVotingStore};
pub use supervisor::{ConnectionHandle, ConnectionSupervisor, Liveness, DEFAULT_MAX_ATTEMPTS};
pub use voting::{OwnedPgVotingStore, PgVotingStore, VotingStore};
