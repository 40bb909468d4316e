// src/config.rs

//! Configuration loading and validation.
//!
//! A single TOML file, parsed with `serde` + `toml`, following the same
//! read-to-string-then-`toml::from_str` shape as `warden::config::WardenConfig::from_file` —
//! adapted to synchronous `std::fs` since config loading happens before the Tokio runtime
//! exists, exactly as the teacher's own `Config::from_file` runs ahead of `#[tokio::main]`.

use crate::error::RepmgrdError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Whether this node takes part in automated promotion/follow, or only watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverMode {
    Automatic,
    Manual,
}

impl Default for FailoverMode {
    fn default() -> Self {
        FailoverMode::Manual
    }
}

/// Configuration consumed by the daemon, per `spec.md` §6.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub node_id: i32,
    pub conninfo: String,

    #[serde(default)]
    pub failover_mode: FailoverMode,

    pub promote_command: Option<String>,
    pub service_promote_command: Option<String>,
    pub follow_command: Option<String>,

    #[serde(with = "humantime_serde", default = "default_promote_delay")]
    pub promote_delay: Duration,

    #[serde(with = "humantime_serde", default = "default_response_timeout")]
    pub primary_response_timeout: Duration,

    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(with = "humantime_serde", default = "default_wait_primary_timeout")]
    pub wait_primary_timeout: Duration,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub log_file: Option<String>,

    #[serde(default)]
    pub log_status_interval: i64,

    #[serde(default)]
    pub monitoring_history: bool,
}

fn default_promote_delay() -> Duration {
    Duration::ZERO
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_reconnect_attempts() -> u32 {
    crate::db::DEFAULT_MAX_ATTEMPTS
}

fn default_wait_primary_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RepmgrdError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RepmgrdError::Config(format!("could not read config file: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RepmgrdError::Config(format!("could not parse config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Fails fast on the config-level invariants `spec.md` §6/§8 name: automatic mode
    /// needs at least one promote command and a follow command; an inactive node under
    /// automatic failover is a startup error, checked separately once the node record is
    /// read (see [`crate::monitor::validate_active_for_automatic`]).
    fn validate(&self) -> Result<(), RepmgrdError> {
        if self.failover_mode == FailoverMode::Automatic {
            if self.promote_command.is_none() && self.service_promote_command.is_none() {
                return Err(RepmgrdError::Config(
                    "automatic failover_mode requires promote_command or service_promote_command"
                        .to_string(),
                ));
            }
            if self.follow_command.is_none() {
                return Err(RepmgrdError::Config(
                    "automatic failover_mode requires follow_command".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The command `promote_self` should run: `service_promote_command` takes
    /// precedence over `promote_command` per `spec.md` §4.5 step 3.
    pub fn effective_promote_command(&self) -> Option<&str> {
        self.service_promote_command
            .as_deref()
            .or(self.promote_command.as_deref())
    }
}
