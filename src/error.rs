// src/error.rs

//! The primary error types for the daemon.
//!
//! Mirrors the split used throughout the codebase this one started from: a closed,
//! named `thiserror` enum for errors that must be told apart (fatal startup failures,
//! in particular, which map onto distinct process exit codes), and `anyhow::Result`
//! everywhere else.

use thiserror::Error;

/// Process exit codes named in the CLI contract. `main` never returns a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    BadConfig = 1,
    BadPidFile = 2,
    SysFailure = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Fatal errors that can only be handled by aborting startup. Recoverable outcomes
/// (failed elections, failed promotions, unreachable peers) are never represented as
/// `Err` values — they are `FailoverState`/`ElectionResult` variants handled explicitly
/// by the state machines in [`crate::election`] and [`crate::failover`].
#[derive(Error, Debug)]
pub enum RepmgrdError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("node {0} is inactive; automatic failover mode requires an active node record")]
    InactiveNodeAutomatic(i32),

    #[error("no node record found for node_id {0} in the local database")]
    MissingNodeRecord(i32),

    #[error("PID file {path} is locked by running process {pid}")]
    PidFileLocked { path: String, pid: i32 },

    #[error("failed to daemonize: {0}")]
    DaemonizeFailed(String),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepmgrdError {
    /// Maps a fatal startup error onto the exit code the CLI contract promises.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RepmgrdError::Config(_)
            | RepmgrdError::InactiveNodeAutomatic(_)
            | RepmgrdError::MissingNodeRecord(_) => ExitCode::BadConfig,
            RepmgrdError::PidFileLocked { .. } => ExitCode::BadPidFile,
            RepmgrdError::DaemonizeFailed(_) => ExitCode::SysFailure,
            RepmgrdError::Database(_) | RepmgrdError::Io(_) => ExitCode::SysFailure,
        }
    }
}
