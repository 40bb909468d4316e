// src/pidfile.rs

//! PID-file lifecycle per `spec.md` §6: read-int / signal-0-probe / overwrite / unlink.
//!
//! The liveness probe is `libc::kill(pid, 0)`, the same raw primitive the teacher's
//! `SHUTDOWN` command reaches for (`core::commands::generic::shutdown`'s
//! `libc::kill(pid as i32, libc::SIGTERM)`) — sending signal 0 performs only the
//! permission/existence check, never actually signaling the process.

use crate::error::RepmgrdError;
use std::fs;
use std::path::{Path, PathBuf};

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claims `path` for this process. Refuses to start if the file already names a
    /// live PID; otherwise (missing file, unreadable contents, or a dead PID)
    /// overwrites it with our own.
    pub fn claim(path: impl AsRef<Path>) -> Result<Self, RepmgrdError> {
        let path = path.as_ref().to_path_buf();

        if let Ok(contents) = fs::read_to_string(&path)
            && let Some(existing_pid) = contents.trim().parse::<i32>().ok()
            && pid_is_alive(existing_pid)
        {
            return Err(RepmgrdError::PidFileLocked {
                path: path.display().to_string(),
                pid: existing_pid,
            });
        }

        let our_pid = std::process::id();
        fs::write(&path, our_pid.to_string())
            .map_err(|e| RepmgrdError::Config(format!("could not write pid file: {e}")))?;

        Ok(Self { path })
    }

    /// Unlinks the PID file on graceful termination.
    pub fn remove(self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn pid_is_alive(pid: i32) -> bool {
    // SAFETY: signal 0 performs no action beyond an existence/permission check; `pid` is
    // a value read from a file, not attacker-controlled process memory.
    unsafe { libc::kill(pid, 0) == 0 }
}
