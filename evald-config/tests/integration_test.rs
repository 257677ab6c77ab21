//! Integration tests for evald-config

use evald_config::*;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = EvaldConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("EVALD_LOG_LEVEL", Some("debug")),
        ("EVALD_LOG_FORMAT", Some("json")),
        ("EVALD_MAX_QUEUE_LEN", Some("8")),
        ("EVALD_STALL_WARNING_SECONDS", Some("5")),
        ("EVALD_WORKER_PROGRAM", Some("/opt/evald/bin/evald")),
        ("EVALD_WORKER_CONNECT_TIMEOUT", Some("3")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.session.max_queue_len, Some(8));
        assert_eq!(config.session.stall_warning, Duration::from_secs(5));
        assert_eq!(
            config.worker.program,
            Some(PathBuf::from("/opt/evald/bin/evald"))
        );
        assert_eq!(config.worker.connect_timeout, Duration::from_secs(3));
    });
}

#[test]
fn test_invalid_env_values_are_rejected() {
    with_vars(vec![("EVALD_MAX_QUEUE_LEN", Some("lots"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    });

    with_vars(vec![("EVALD_MAX_QUEUE_LEN", Some("0"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { section: "session", .. }));
    });

    with_vars(vec![("EVALD_LOG_LEVEL", Some("chatty"))], || {
        assert!(ConfigLoader::new().from_env().is_err());
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("SANDBOX_MAX_QUEUE_LEN", Some("2"))], || {
        let config = ConfigLoader::with_prefix("SANDBOX").from_env().unwrap();
        assert_eq!(config.session.max_queue_len, Some(2));
    });
}

#[test]
fn test_yaml_config_serialization() {
    let yaml = EvaldConfig::generate_sample();
    let parsed: EvaldConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.worker.args, vec!["--worker"]);
}

#[test]
fn test_load_from_file() {
    let yaml = r#"
session:
  max_queue_len: 4
  stall_warning: 12s

worker:
  program: /usr/local/bin/evald
  args: ["--worker", "--quiet"]
  connect_timeout: 2s
  shutdown_grace: 250ms
  env:
    NODE_ENV: test

logging:
  level: warn
  format: compact
  include_location: true
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        ConfigLoader::new().from_file(file.path()).unwrap()
    });

    assert_eq!(config.session.max_queue_len, Some(4));
    assert_eq!(config.session.stall_warning, Duration::from_secs(12));
    assert_eq!(config.worker.args, vec!["--worker", "--quiet"]);
    assert_eq!(config.worker.connect_timeout, Duration::from_secs(2));
    assert_eq!(config.worker.shutdown_grace, Duration::from_millis(250));
    assert_eq!(config.worker.env.get("NODE_ENV").map(String::as_str), Some("test"));
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.logging.format, LogFormat::Compact);
    assert!(config.logging.include_location);
}

#[test]
fn test_shown_config_loads_back_unchanged() {
    let yaml = "session:\n  stall_warning: 1m 30s\nworker:\n  shutdown_grace: 1500ms\n";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let loaded = with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        ConfigLoader::new().from_file(file.path()).unwrap()
    });
    assert_eq!(loaded.session.stall_warning, Duration::from_secs(90));
    assert_eq!(loaded.worker.shutdown_grace, Duration::from_millis(1500));

    let shown = serde_yaml::to_string(&loaded).unwrap();
    let reloaded: EvaldConfig = serde_yaml::from_str(&shown).unwrap();
    assert!(reloaded.validate_all().is_ok());
    assert_eq!(reloaded.session, loaded.session);
    assert_eq!(reloaded.worker, loaded.worker);
}

#[test]
fn test_env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"logging:\n  level: error\n").unwrap();

    with_vars(vec![("EVALD_LOG_LEVEL", Some("trace"))], || {
        let config = ConfigLoader::new().load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, LogLevel::Trace);
    });
}

#[test]
fn test_missing_file_is_an_error() {
    let err = ConfigLoader::new()
        .from_file("/nonexistent/evald.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_partial_yaml_uses_defaults() {
    let config: EvaldConfig = serde_yaml::from_str("session:\n  max_queue_len: 3\n").unwrap();
    assert_eq!(config.session.max_queue_len, Some(3));
    assert_eq!(config.session.stall_warning, Duration::from_secs(30));
    assert_eq!(config.worker, WorkerConfig::default());
    assert_eq!(config.logging, LoggingConfig::default());
}
