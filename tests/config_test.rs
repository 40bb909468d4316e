use repmgrd::config::{Config, FailoverMode};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn manual_mode_does_not_require_commands() {
    let file = write_config(
        r#"
        node_id = 1
        conninfo = "host=localhost"
        failover_mode = "manual"
        "#,
    );
    let cfg = Config::from_file(file.path()).unwrap();
    assert_eq!(cfg.failover_mode, FailoverMode::Manual);
}

#[test]
fn automatic_mode_without_commands_is_rejected() {
    let file = write_config(
        r#"
        node_id = 1
        conninfo = "host=localhost"
        failover_mode = "automatic"
        "#,
    );
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn automatic_mode_missing_follow_command_is_rejected() {
    let file = write_config(
        r#"
        node_id = 1
        conninfo = "host=localhost"
        failover_mode = "automatic"
        promote_command = "pg_promote"
        "#,
    );
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn automatic_mode_with_commands_is_accepted() {
    let file = write_config(
        r#"
        node_id = 1
        conninfo = "host=localhost"
        failover_mode = "automatic"
        promote_command = "pg_promote"
        follow_command = "restart_as_standby"
        "#,
    );
    let cfg = Config::from_file(file.path()).unwrap();
    assert_eq!(cfg.effective_promote_command(), Some("pg_promote"));
}

#[test]
fn service_promote_command_takes_precedence() {
    let file = write_config(
        r#"
        node_id = 1
        conninfo = "host=localhost"
        failover_mode = "automatic"
        promote_command = "pg_promote"
        service_promote_command = "pg_ctl promote"
        follow_command = "restart_as_standby"
        "#,
    );
    let cfg = Config::from_file(file.path()).unwrap();
    assert_eq!(cfg.effective_promote_command(), Some("pg_ctl promote"));
}

#[test]
fn unreadable_path_is_a_config_error() {
    assert!(Config::from_file("/nonexistent/path/repmgrd.toml").is_err());
}

#[test]
fn defaults_are_applied_when_fields_are_absent() {
    let file = write_config(
        r#"
        node_id = 3
        conninfo = "host=localhost"
        "#,
    );
    let cfg = Config::from_file(file.path()).unwrap();
    assert_eq!(cfg.failover_mode, FailoverMode::Manual);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.log_status_interval, 0);
    assert_eq!(cfg.promote_delay, std::time::Duration::ZERO);
}
