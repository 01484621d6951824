//! Unit tests for config file loading
//!
//! Tests that manipulate XDG_CONFIG_HOME are marked with #[serial] so they
//! run sequentially, not in parallel.

use radiosync_common::config::{AcquisitionToml, TomlConfig};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_full_config_file_parses() {
    let text = r#"
        port = 3100
        bind_address = "127.0.0.1"
        media_dir = "/var/tmp/radiosync"
        public_base_url = "https://radio.example.com"
        max_queue_length = 10
        start_lead_ms = 3000
        timesync_interval_ms = 2500
        sweep_interval_secs = 600
        orphan_max_age_secs = 1800
        delete_retry_delay_ms = 1000
        log_level = "info"

        [acquisition]
        yt_dlp_path = "/usr/local/bin/yt-dlp"
        ffprobe_path = "/usr/bin/ffprobe"
        max_duration_secs = 600
        timeout_secs = 120
    "#;

    let config = TomlConfig::from_toml_str(text).unwrap();
    assert_eq!(config.port, Some(3100));
    assert_eq!(config.bind_address.as_deref(), Some("127.0.0.1"));
    assert_eq!(config.media_dir, Some(PathBuf::from("/var/tmp/radiosync")));
    assert_eq!(config.max_queue_length, Some(10));
    assert_eq!(config.start_lead_ms, Some(3000));
    assert_eq!(config.delete_retry_delay_ms, Some(1000));
    assert_eq!(
        config.acquisition,
        AcquisitionToml {
            yt_dlp_path: Some("/usr/local/bin/yt-dlp".into()),
            ffprobe_path: Some("/usr/bin/ffprobe".into()),
            max_duration_secs: Some(600),
            timeout_secs: Some(120),
        }
    );
}

#[test]
fn test_partial_config_leaves_rest_unset() {
    let config = TomlConfig::from_toml_str("start_lead_ms = 8000\n").unwrap();
    assert_eq!(config.start_lead_ms, Some(8000));
    assert_eq!(config.port, None);
    assert_eq!(config.acquisition, AcquisitionToml::default());
}

#[test]
fn test_unknown_key_is_rejected() {
    let err = TomlConfig::from_toml_str("max_queue = 5\n").unwrap_err();
    assert!(err.to_string().contains("Invalid config file"));
}

#[test]
fn test_wrong_type_is_rejected() {
    assert!(TomlConfig::from_toml_str("port = \"eighty\"\n").is_err());
}

#[test]
fn test_explicit_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = TomlConfig::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Cannot read config file"));
}

#[test]
fn test_explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radio.toml");
    std::fs::write(&path, "max_queue_length = 3\n").unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();
    assert_eq!(config.max_queue_length, Some(3));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_config_discovered_under_xdg_config_home() {
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("radiosync");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(app_dir.join("config.toml"), "port = 4242\n").unwrap();

    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let config = TomlConfig::load(None).unwrap();

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(config.port, Some(4242));
}
