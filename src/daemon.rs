// src/daemon.rs

//! Daemonization (double fork) and signal-handler plumbing, per `spec.md` §5/§6.
//!
//! Signal delivery uses `tokio::signal::unix::{signal, SignalKind}`, the exact API the
//! teacher's `server::connection_loop::await_shutdown_signal` uses for SIGINT/SIGTERM;
//! this crate adds a SIGHUP handler (absent from the teacher, present in the original
//! `repmgrd.c` as `handle_sighup`) that only flips a flag observed by the Role Monitor
//! between ticks — never inside a suspension point that could tear down a live query.
//! Daemonization itself has no counterpart anywhere in the retrieved pack, so it is built
//! directly on `libc` (`fork`, `setsid`, `chdir`, `open`, `dup2`), the one systems-level
//! dependency the teacher already carries.

use crate::error::RepmgrdError;
use crate::state::SignalFlags;
use std::ffi::CString;
use std::path::Path;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

/// Double-forks into the background. The grandchild becomes session leader, `chdir`s to
/// `config_dir`, and has stdin/stdout redirected to `/dev/null`. Must be called before
/// the Tokio runtime is started — forking a multi-threaded process is unsound.
pub fn daemonize(config_dir: &Path) -> Result<(), RepmgrdError> {
    // SAFETY: these are the standard double-fork steps, performed before any threads
    // (including Tokio's runtime) exist in this process.
    unsafe {
        match libc::fork() {
            -1 => return Err(RepmgrdError::DaemonizeFailed("first fork failed".to_string())),
            0 => {}
            _ => std::process::exit(0),
        }

        if libc::setsid() == -1 {
            return Err(RepmgrdError::DaemonizeFailed("setsid failed".to_string()));
        }

        match libc::fork() {
            -1 => return Err(RepmgrdError::DaemonizeFailed("second fork failed".to_string())),
            0 => {}
            _ => std::process::exit(0),
        }

        let dir = CString::new(config_dir.to_string_lossy().as_bytes())
            .map_err(|_| RepmgrdError::DaemonizeFailed("invalid config directory path".to_string()))?;
        if libc::chdir(dir.as_ptr()) == -1 {
            return Err(RepmgrdError::DaemonizeFailed("chdir failed".to_string()));
        }

        redirect_to_dev_null(libc::STDIN_FILENO)?;
        redirect_to_dev_null(libc::STDOUT_FILENO)?;
    }

    Ok(())
}

/// # Safety
/// Must be called with no other threads running (pre-Tokio-runtime).
unsafe fn redirect_to_dev_null(fd: i32) -> Result<(), RepmgrdError> {
    let dev_null = CString::new("/dev/null").unwrap();
    unsafe {
        let null_fd = libc::open(dev_null.as_ptr(), libc::O_RDWR);
        if null_fd == -1 {
            return Err(RepmgrdError::DaemonizeFailed("could not open /dev/null".to_string()));
        }
        if libc::dup2(null_fd, fd) == -1 {
            return Err(RepmgrdError::DaemonizeFailed("dup2 failed".to_string()));
        }
        if null_fd != fd {
            libc::close(null_fd);
        }
    }
    Ok(())
}

/// Spawns the SIGINT/SIGTERM/SIGHUP listeners. SIGINT and SIGTERM flip the terminate
/// flag; SIGHUP flips the hot-reload flag. Both are observed by the Role Monitor at
/// defined suspension points only.
pub fn spawn_signal_handlers(flags: SignalFlags) {
    let term_flags = flags.clone();
    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
        }
        term_flags.request_terminate();
    });

    let reload_flags = flags;
    tokio::spawn(async move {
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
        loop {
            sighup.recv().await;
            info!("SIGHUP received, requesting config/log-level reload");
            reload_flags.request_reload();
        }
    });
}
