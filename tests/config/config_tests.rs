// Config file loading, normalization and validation

use crate::common::create_temp_dir;
use proxywatch::config::{
    Config, ConfigError, MonitorConfig, MonitorConfigUpdate, CONFIG_PATH_ENV_VAR,
};
use serial_test::serial;
use std::time::Duration;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = create_temp_dir();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.monitor.poll_interval_ms, 30_000);
    assert_eq!(config.monitor.debounce_ms, 1_000);
    assert_eq!(config.monitor.max_retries, 3);
    assert!(config.fallback.enabled);
}

#[test]
fn test_out_of_range_values_are_clamped() {
    let config = Config::from_toml_str(
        r#"
        [monitor]
        poll_interval_ms = 500
        max_retries = -4
        retry_backoff_secs = 0.0
        reachability_interval_ms = 9999999
        "#,
    )
    .unwrap();

    assert_eq!(config.monitor.poll_interval_ms, 10_000);
    assert_eq!(config.monitor.max_retries, 0);
    assert_eq!(config.monitor.retry_backoff_secs, 1.0);
    assert_eq!(config.monitor.reachability_interval_ms, 600_000);
}

#[test]
fn test_invalid_toml_is_a_parse_error() {
    let err = Config::from_toml_str("[monitor\npoll_interval_ms = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_init_writes_once_and_round_trips() {
    let dir = create_temp_dir();
    let path = dir.path().join("nested").join("config.toml");

    assert!(Config::init_at(&path).unwrap());
    assert!(!Config::init_at(&path).unwrap());

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, Config::default());
}

#[test]
fn test_check_rejects_bad_fallback_and_targets() {
    let mut config = Config::default();
    assert!(config.check().is_ok());

    config.fallback.proxy_url = Some("ftp://nope:21".to_string());
    assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));

    config.fallback.proxy_url = Some("socks5://127.0.0.1:1080".to_string());
    config.reachability.targets = vec![];
    assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));

    config.reachability.targets = vec!["github.com:443".to_string(), "://".to_string()];
    assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_backoff_delay_doubles() {
    let config = MonitorConfig {
        retry_backoff_secs: 0.5,
        ..MonitorConfig::default()
    };

    assert_eq!(config.backoff_delay(0), Duration::ZERO);
    assert_eq!(config.backoff_delay(1), Duration::from_millis(500));
    assert_eq!(config.backoff_delay(2), Duration::from_secs(1));
    assert_eq!(config.backoff_delay(3), Duration::from_secs(2));
}

#[test]
fn test_partial_update_merges_and_clamps() {
    let mut config = MonitorConfig::default();
    config.apply(&MonitorConfigUpdate {
        debounce_ms: Some(250),
        max_retries: Some(-1),
        ..Default::default()
    });

    assert_eq!(config.debounce(), Duration::from_millis(250));
    assert_eq!(config.retries(), 0);
    assert_eq!(config.poll_interval_ms, 30_000);
}

#[test]
fn test_reachability_presets_follow_config() {
    let mut config = Config::default();
    config.reachability.targets = vec!["example.org:443".to_string()];
    config.reachability.background_timeout_ms = 2_000;

    let background = config.reachability.background_options();
    assert_eq!(background.timeout_ms, 2_000);
    assert_eq!(background.targets, vec!["example.org:443".to_string()]);
    assert!(config.reachability.interactive_options().verbose);
}

#[test]
#[serial]
fn test_config_path_env_override() {
    let dir = create_temp_dir();
    let path = dir.path().join("custom.toml");
    std::env::set_var(CONFIG_PATH_ENV_VAR, &path);

    let resolved = Config::config_path().unwrap();
    std::env::remove_var(CONFIG_PATH_ENV_VAR);

    assert_eq!(resolved, path);
}
