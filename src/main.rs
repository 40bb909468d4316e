// src/main.rs

//! The main entry point for the `repmgrd` daemon.

use anyhow::Result;
use clap::Parser;
use repmgrd::cli::Cli;
use repmgrd::config::Config;
use repmgrd::daemon;
use repmgrd::db::{ConnectionSupervisor, PgPeerDialer, PgVotingStore, VotingStore};
use repmgrd::error::{ExitCode, RepmgrdError};
use repmgrd::events::EventRecorder;
use repmgrd::executor::ShellExecutor;
use repmgrd::monitor;
use repmgrd::node::NodeInfo;
use repmgrd::pidfile::PidFile;
use repmgrd::state::{LocalState, SignalFlags};
use std::path::Path;
use std::process::ExitCode as ProcessExitCode;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

fn main() -> ProcessExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config_file) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration from \"{}\": {e}", cli.config_file);
            return process_exit_code(e.exit_code());
        }
    };

    // Daemonization must happen before the Tokio runtime starts: forking a
    // multi-threaded process is unsound once worker threads exist.
    if cli.daemonize {
        let config_dir = Path::new(&cli.config_file)
            .parent()
            .unwrap_or_else(|| Path::new("."));
        if let Err(e) = daemon::daemonize(config_dir) {
            eprintln!("failed to daemonize: {e}");
            return process_exit_code(e.exit_code());
        }
    }

    let pid_file = if let Some(path) = &cli.pid_file {
        match PidFile::claim(path) {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("{e}");
                return process_exit_code(e.exit_code());
            }
        }
    } else {
        None
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return process_exit_code(ExitCode::SysFailure);
        }
    };

    let result = runtime.block_on(run_app(cli, config));

    if let Some(pid_file) = pid_file {
        pid_file.remove();
    }

    match result {
        Ok(()) => ProcessExitCode::SUCCESS,
        Err(e) => {
            error!("repmgrd exited with error: {e}");
            let code = e
                .downcast_ref::<RepmgrdError>()
                .map(|re| re.exit_code())
                .unwrap_or(ExitCode::SysFailure);
            process_exit_code(code)
        }
    }
}

fn process_exit_code(code: ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code.code() as u8)
}

async fn run_app(cli: Cli, config: Config) -> Result<()> {
    let log_level = cli.effective_log_level(&config.log_level);
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    info!("repmgrd starting for node_id={}", config.node_id);

    let signals = SignalFlags::default();
    daemon::spawn_signal_handlers(signals.clone());

    let supervisor = ConnectionSupervisor::new(config.reconnect_attempts);
    let handle = supervisor
        .open(&config.conninfo, true)
        .await
        .map_err(|e| anyhow::anyhow!("could not open local database connection at startup: {e}"))?;

    let self_info: NodeInfo = {
        let store = PgVotingStore::new(&handle.client);
        store
            .get_node_record(config.node_id)
            .await?
            .ok_or(RepmgrdError::MissingNodeRecord(config.node_id))?
    };

    monitor::validate_active_for_automatic(&self_info, config.failover_mode)?;

    if !self_info.role.is_implemented() {
        anyhow::bail!(
            "node {} has role {:?}, which this daemon does not implement",
            self_info.node_id,
            self_info.role
        );
    }

    let mut state = LocalState::new(self_info);
    state.local_conn = Some(handle);
    state.signals = signals;

    let recorder = EventRecorder::new();
    let dialer = PgPeerDialer::new();
    let executor = ShellExecutor;

    monitor::run(
        state,
        &config,
        &recorder,
        &supervisor,
        &dialer,
        &executor,
        &cli,
        &reload_handle,
    )
    .await
}
