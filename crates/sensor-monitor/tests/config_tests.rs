//! Config file loading. Environment layering goes through `resolve` with an
//! explicit lookup so these tests never touch the process environment.

use std::io::Write;
use std::time::Duration;

use sensor_monitor::config::{ENV_INTERVAL_MS, ENV_URL};
use sensor_monitor::{FileConfig, MonitorConfig};
use tempfile::NamedTempFile;

// ── Helpers ──

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn no_env(_: &str) -> Option<String> {
    None
}

// ── Tests ──

#[test]
fn test_file_values_apply() {
    let file = write_config(
        r#"
backend_url = "http://detector.local:9000"
interval_ms = 500
threshold = 75
reading_capacity = 20
"#,
    );

    let config =
        MonitorConfig::resolve(FileConfig::from_path(file.path()).unwrap(), no_env).unwrap();
    assert_eq!(config.backend_url, "http://detector.local:9000");
    assert_eq!(config.interval(), Duration::from_millis(500));
    assert_eq!(config.threshold, 75);
    assert_eq!(config.reading_capacity, 20);
    // Unset keys keep their defaults.
    assert_eq!(config.anomaly_capacity, MonitorConfig::default().anomaly_capacity);
}

#[test]
fn test_env_overrides_file() {
    let file = write_config("backend_url = \"http://from-file:1\"\ninterval_ms = 500\n");
    let env = |key: &str| match key {
        k if k == ENV_URL => Some("https://from-env".to_string()),
        k if k == ENV_INTERVAL_MS => Some("250".to_string()),
        _ => None,
    };

    let config = MonitorConfig::resolve(FileConfig::from_path(file.path()).unwrap(), env).unwrap();
    assert_eq!(config.backend_url, "https://from-env");
    assert_eq!(config.interval_ms, 250);
}

#[test]
fn test_unknown_key_rejected() {
    let file = write_config("backend_url = \"http://x\"\npoll_rate = 3\n");
    let err = FileConfig::from_path(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("poll_rate"));
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = MonitorConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_invalid_file_values_rejected() {
    let file = write_config("threshold = 150\n");
    let file_config = FileConfig::from_path(file.path()).unwrap();
    assert!(MonitorConfig::resolve(file_config, no_env).is_err());

    let file = write_config("interval_ms = 0\n");
    let file_config = FileConfig::from_path(file.path()).unwrap();
    assert!(MonitorConfig::resolve(file_config, no_env).is_err());
}
