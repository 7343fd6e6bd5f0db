use std::io::Write;

use ct_domain::config::{ConfigSeverity, LogFormat};
use ct_timerd::cli::{config, load_config_from};

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.pool.initial_capacity, 256);
    assert!(cfg.timers.expressions.is_empty());
}

#[test]
fn loads_all_sections() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[pool]
max_timers = 8
thread_name = "timers"

[timers]
expressions = ["daily", "Mon..Fri-*-*-*-09:00:00+0100"]

[observability]
log_format = "compact"
"#
    )
    .unwrap();

    let cfg = load_config_from(file.path()).unwrap();
    assert_eq!(cfg.pool.max_timers, Some(8));
    assert_eq!(cfg.pool.thread_name, "timers");
    assert_eq!(cfg.timers.expressions.len(), 2);
    assert_eq!(cfg.observability.log_format, LogFormat::Compact);
    assert!(config::issues(&cfg).is_empty());
}

#[test]
fn malformed_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[pool\nmax_timers = ").unwrap();
    let err = load_config_from(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("parsing "));
}

#[test]
fn configured_expressions_are_parse_checked() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[timers]\nexpressions = [\"daily\", \"*-02-30\"]").unwrap();

    let cfg = load_config_from(file.path()).unwrap();
    let issues = config::issues(&cfg);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, ConfigSeverity::Error);
    assert_eq!(issues[0].field, "timers.expressions[1]");
    assert!(!config::validate(&cfg, "test.toml"));
}
