// Unit tests for config loading, validation and environment overrides.

use crate::config::channel::{HOST_ENV_VAR, PORT_ENV_VAR};
use crate::config::{AppConfig, ChannelConfig};
use crate::error::config::ConfigError;

use std::collections::HashMap;

/// **VALUE**: Verifies the shipped defaults pass validation.
///
/// **BUG THIS CATCHES**: Would catch a default (e.g. zero ping interval) that makes a fresh
/// install refuse to start its channel.
#[test]
fn given_default_config_when_validated_then_ok() {
    let config = AppConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.channel.max_missed_pings, 3);
    assert_eq!(config.channel.address(), crate::DEFAULT_CONTROL_ADDRESS);
}

/// **VALUE**: Verifies zero durations are rejected by name.
#[test]
fn given_zero_ping_interval_when_validated_then_validation_error() {
    // GIVEN: A zero ping interval
    let config = ChannelConfig {
        ping_interval_ms: 0,
        ..ChannelConfig::default()
    };

    // WHEN: Validating
    let result = config.validate();

    // THEN: Error names the field
    match result {
        Err(ConfigError::ValidationError { reason, .. }) => {
            assert!(reason.contains("ping_interval_ms"), "{reason}")
        }
        other => panic!("expected ValidationError, got {other:?}"),
    }
}

/// **VALUE**: Verifies chunk size bounds.
#[test]
fn given_oversized_chunk_when_validated_then_validation_error() {
    let config = ChannelConfig {
        chunk_size: 64 * 1024 * 1024,
        ..ChannelConfig::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: Verifies environment overrides and that a bad port is ignored.
///
/// **BUG THIS CATCHES**: Would catch a typo in `DISPLAY_CONTROL_PORT` replacing the port
/// with 0 (random port) instead of keeping the configured one.
#[test]
fn given_env_overrides_when_applied_then_host_set_and_bad_port_ignored() {
    // GIVEN: A host override and an unparsable port
    let env: HashMap<&str, &str> =
        HashMap::from([(HOST_ENV_VAR, "127.0.0.1"), (PORT_ENV_VAR, "eighty")]);
    let mut config = ChannelConfig::default();

    // WHEN: Applying overrides
    config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    // THEN: Host replaced, port untouched
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, crate::DEFAULT_CONTROL_PORT);

    config.apply_overrides(|key| (key == PORT_ENV_VAR).then(|| "9100".to_string()));
    assert_eq!(config.port, 9100);
}

/// **VALUE**: Pins the default listening address to the one the display dials.
///
/// **BUG THIS CATCHES**: Would catch a changed default port, after which a fresh
/// install and the display never find each other.
#[test]
fn given_default_config_when_built_then_listens_on_display_port() {
    // GIVEN/WHEN: Defaults
    let config = ChannelConfig::default();

    // THEN: All interfaces, port 8765
    assert_eq!(config.port, 8765);
    assert_eq!(config.address(), "0.0.0.0:8765");
    assert_eq!(crate::DEFAULT_CONTROL_ADDRESS, "0.0.0.0:8765");
}

/// **VALUE**: Verifies a missing config file yields defaults.
#[test]
fn given_missing_file_when_loaded_then_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let config = AppConfig::load(dir.path()).unwrap();

    assert_eq!(config, AppConfig::default());
}

/// **VALUE**: Verifies save then load preserves every field and leaves no temp file.
#[test]
fn given_saved_config_when_loaded_then_equal() {
    // GIVEN: A non-default config saved to disk
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.channel.port = 9001;
    config.channel.ping_interval_ms = 750;

    // WHEN: Saving and loading
    config.save(dir.path()).unwrap();
    let loaded = AppConfig::load(dir.path()).unwrap();

    // THEN: Identical, temp file renamed away
    assert_eq!(loaded, config);
    assert!(!dir.path().join("config.json.tmp").exists());
}

/// **VALUE**: Verifies partial files are completed with defaults.
#[test]
fn given_partial_file_when_loaded_then_missing_fields_defaulted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"channel": {"port": 7000}}"#,
    )
    .unwrap();

    let loaded = AppConfig::load(dir.path()).unwrap();

    assert_eq!(loaded.channel.port, 7000);
    assert_eq!(loaded.channel.host, ChannelConfig::default().host);
}

/// **VALUE**: Verifies a corrupt file is reported as a parse error.
#[test]
fn given_corrupt_file_when_loaded_then_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    let result = AppConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}
