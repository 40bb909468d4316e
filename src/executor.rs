// src/executor.rs

//! The `Executor` capability: runs the operator-provided `promote_command` and
//! `follow_command` shell invocations behind a trait, so tests can stub their outcomes
//! deterministically instead of shelling out.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `command` via a shell, blocking until it exits. Returns the exit code, or
    /// `None` if the process was killed by a signal. The main loop is fully blocked for
    /// the duration of this call.
    async fn run(&self, command: &str) -> anyhow::Result<Option<i32>>;
}

/// Invokes commands through `/bin/sh -c`, treating `promote_command`/`follow_command`
/// as opaque shell strings.
pub struct ShellExecutor;

#[async_trait]
impl Executor for ShellExecutor {
    async fn run(&self, command: &str) -> anyhow::Result<Option<i32>> {
        info!("executing external command: {}", command);
        let status = Command::new("/bin/sh").arg("-c").arg(command).status().await?;
        if !status.success() {
            warn!("external command exited with status {:?}", status.code());
        }
        Ok(status.code())
    }
}

/// A scripted `Executor` for tests: returns a fixed exit code without spawning
/// anything.
pub struct FakeExecutor {
    pub exit_code: Option<i32>,
}

impl FakeExecutor {
    pub fn succeeding() -> Self {
        Self { exit_code: Some(0) }
    }

    pub fn failing() -> Self {
        Self { exit_code: Some(1) }
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn run(&self, _command: &str) -> anyhow::Result<Option<i32>> {
        Ok(self.exit_code)
    }
}
