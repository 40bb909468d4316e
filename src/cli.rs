// src/cli.rs

//! Command-line parsing, per `spec.md` §6.
//!
//! Grounded on the `clap::Parser` derive pattern used by the pack's
//! `election-server/src/bin/indexer.rs` (`#[derive(Parser)]`, `env = "..."` fallbacks,
//! `#[arg(long, short)]`) — the teacher itself hand-rolls `env::args()` scanning for its
//! two process modes, but once a binary needs this many distinct options `clap` is the
//! idiomatic choice.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "repmgrd", version, about = "Replication management daemon")]
pub struct Cli {
    /// Path to the daemon's TOML configuration file.
    #[arg(short = 'f', long = "config-file", env = "REPMGRD_CONFIG_FILE")]
    pub config_file: String,

    /// Daemonize: double-fork into the background.
    #[arg(short = 'd', long = "daemonize")]
    pub daemonize: bool,

    /// Path to the PID file. Required when `--daemonize` is set.
    #[arg(short = 'p', long = "pid-file")]
    pub pid_file: Option<String>,

    /// Overrides `log_level` from the config file.
    #[arg(short = 'L', long = "log-level")]
    pub log_level: Option<String>,

    /// Shorthand for `--log-level debug`.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Legacy override of `monitoring_history`.
    #[arg(short = 'm', long = "monitoring-history")]
    pub monitoring_history: bool,
}

// `-?` from the original CLI contract is not representable as a clap short flag (`?` is
// reserved); `-h`/`--help`, which clap derives automatically, covers the same need.

impl Cli {
    /// The effective log level after CLI overrides: `-v` beats `-L`, `-L` beats the
    /// config file's `log_level`.
    pub fn effective_log_level(&self, config_log_level: &str) -> String {
        if self.verbose {
            "debug".to_string()
        } else if let Some(level) = &self.log_level {
            level.clone()
        } else {
            config_log_level.to_string()
        }
    }
}
