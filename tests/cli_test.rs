use repmgrd::cli::Cli;

fn cli(log_level: Option<&str>, verbose: bool) -> Cli {
    Cli {
        config_file: "x.toml".to_string(),
        daemonize: false,
        pid_file: None,
        log_level: log_level.map(String::from),
        verbose,
        monitoring_history: false,
    }
}

#[test]
fn verbose_overrides_everything() {
    let c = cli(Some("warn"), true);
    assert_eq!(c.effective_log_level("info"), "debug");
}

#[test]
fn explicit_log_level_beats_config() {
    let c = cli(Some("warn"), false);
    assert_eq!(c.effective_log_level("info"), "warn");
}

#[test]
fn falls_back_to_config_log_level() {
    let c = cli(None, false);
    assert_eq!(c.effective_log_level("info"), "info");
}
