// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Ferry configuration system.

use ferry_config::diagnostic::{ConfigError, suggest_key};
use ferry_config::model::FerryConfig;
use ferry_config::{load_and_validate_str, load_config, load_config_from_str};
use figment::Jail;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_ferry_config() {
    let toml = r#"
[relay]
name = "ops-relay"
log_level = "debug"
utc_offset_minutes = 180
shutdown_grace_secs = 5

[session]
health_interval_secs = 15
connect_attempts = 5
backoff_base_ms = 250
backoff_max_secs = 60
rate_limit_buffer_secs = 1
max_sessions = 8

[delivery]
send_attempts = 4
retry_base_ms = 100

[album]
settle_ms = 800
processed_ttl_secs = 120

[cache]
media_capacity = 32
media_ttl_secs = 60
upload_capacity = 64

[storage]
database_path = "/tmp/ferry-test.db"
wal_mode = false

[telegram]
bot_token = "123:ABC"
admin_chat_id = 42
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.relay.name, "ops-relay");
    assert_eq!(config.relay.log_level, "debug");
    assert_eq!(config.relay.utc_offset_minutes, 180);
    assert_eq!(config.relay.shutdown_grace_secs, 5);
    assert_eq!(config.session.health_interval_secs, 15);
    assert_eq!(config.session.connect_attempts, 5);
    assert_eq!(config.session.backoff_base_ms, 250);
    assert_eq!(config.session.backoff_max_secs, 60);
    assert_eq!(config.session.rate_limit_buffer_secs, 1);
    assert_eq!(config.session.max_sessions, 8);
    assert_eq!(config.delivery.send_attempts, 4);
    assert_eq!(config.delivery.retry_base_ms, 100);
    assert_eq!(config.album.settle_ms, 800);
    assert_eq!(config.album.processed_ttl_secs, 120);
    assert_eq!(config.cache.media_capacity, 32);
    assert_eq!(config.cache.media_ttl_secs, 60);
    assert_eq!(config.cache.upload_capacity, 64);
    assert_eq!(config.storage.database_path, "/tmp/ferry-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:ABC"));
    assert_eq!(config.telegram.admin_chat_id, Some(42));
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.relay.name, "ferry");
    assert_eq!(config.relay.log_level, "info");
    assert_eq!(config.relay.utc_offset_minutes, 0);
    assert_eq!(config.session.health_interval_secs, 30);
    assert_eq!(config.session.connect_attempts, 3);
    assert_eq!(config.session.backoff_base_ms, 1000);
    assert_eq!(config.session.backoff_max_secs, 300);
    assert_eq!(config.session.rate_limit_buffer_secs, 2);
    assert_eq!(config.session.max_sessions, 100);
    assert_eq!(config.delivery.send_attempts, 3);
    assert_eq!(config.delivery.retry_base_ms, 500);
    assert_eq!(config.album.settle_ms, 1500);
    assert_eq!(config.album.processed_ttl_secs, 600);
    assert_eq!(config.cache.media_capacity, 256);
    assert_eq!(config.cache.media_ttl_secs, 3600);
    assert_eq!(config.cache.upload_capacity, 1024);
    assert!(config.storage.wal_mode);
    assert!(config.telegram.bot_token.is_none());
    assert!(config.telegram.admin_chat_id.is_none());
}

/// Unknown field in [album] section produces an UnknownField error.
#[test]
fn unknown_field_in_album_produces_error() {
    let toml = r#"
[album]
setle_ms = 10
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("setle_ms"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[agent]
name = "x"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("agent"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// FERRY_TELEGRAM_BOT_TOKEN maps to telegram.bot_token, not telegram.bot.token.
#[test]
fn env_var_overrides_telegram_bot_token() {
    Jail::expect_with(|jail| {
        jail.set_env("FERRY_TELEGRAM_BOT_TOKEN", "xyz-from-env");
        let config = load_config()?;
        assert_eq!(config.telegram.bot_token.as_deref(), Some("xyz-from-env"));
        Ok(())
    });
}

/// Environment variables take precedence over the local ferry.toml.
#[test]
fn env_var_overrides_local_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "ferry.toml",
            r#"
[relay]
name = "from-toml"

[session]
rate_limit_buffer_secs = 9
"#,
        )?;
        jail.set_env("FERRY_RELAY_NAME", "from-env");

        let config = load_config()?;
        assert_eq!(config.relay.name, "from-env");
        assert_eq!(config.session.rate_limit_buffer_secs, 9);
        Ok(())
    });
}

/// Numeric env values are parsed into typed fields.
#[test]
fn env_var_sets_numeric_field() {
    Jail::expect_with(|jail| {
        jail.set_env("FERRY_SESSION_RATE_LIMIT_BUFFER_SECS", 7);
        jail.set_env("FERRY_RELAY_UTC_OFFSET_MINUTES", -300);
        let config = load_config()?;
        assert_eq!(config.session.rate_limit_buffer_secs, 7);
        assert_eq!(config.relay.utc_offset_minutes, -300);
        Ok(())
    });
}

/// Missing config files are silently skipped.
#[test]
fn missing_config_files_silently_skipped() {
    let config = ferry_config::load_config_from_path(std::path::Path::new(
        "/nonexistent/path/ferry.toml",
    ))
    .expect("missing file should be silently skipped");
    assert_eq!(config.album.settle_ms, 1500);
}

/// load_and_validate with defaults works when no config file is present.
#[test]
fn load_and_validate_defaults() {
    Jail::expect_with(|_jail| {
        let config = ferry_config::load_and_validate().expect("defaults should validate");
        assert_eq!(config.relay.name, "ferry");
        Ok(())
    });
}

#[test]
fn diagnostic_suggests_close_key() {
    let valid_keys = &["send_attempts", "retry_base_ms"];
    assert_eq!(
        suggest_key("send_atempts", valid_keys),
        Some("send_attempts".to_string())
    );
    assert_eq!(suggest_key("zzzzzz", valid_keys), None);
}

/// Error output from load_and_validate_str carries the key, suggestion and valid keys.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[delivery]
send_atempts = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "send_atempts"
                && suggestion.as_deref() == Some("send_attempts")
                && valid_keys.contains("retry_base_ms")
        })
    });
    assert!(found, "expected UnknownKey for send_atempts, got: {errors:?}");
}

/// Invalid type (string where number expected) produces a clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[cache]
media_capacity = "lots"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidType { key, .. } if key.contains("media_capacity")
        )),
        "expected InvalidType for cache.media_capacity, got: {errors:?}"
    );
}

/// Validation runs after a successful parse and reports every problem.
#[test]
fn validation_errors_are_collected() {
    let toml = r#"
[relay]
utc_offset_minutes = 1000

[album]
settle_ms = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("out of range values should fail");
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(messages.iter().any(|m| m.contains("utc_offset_minutes")));
    assert!(messages.iter().any(|m| m.contains("album.settle_ms")));
}

/// ConfigError implements miette::Diagnostic and renders.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "setle_ms".to_string(),
        suggestion: Some("settle_ms".to_string()),
        valid_keys: "settle_ms, processed_ttl_secs".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `settle_ms`"), "got: {help}");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("setle_ms"));
}

#[test]
fn defaults_round_trip_through_serialization() {
    let config = FerryConfig::default();
    let rendered = toml::to_string(&config).expect("defaults should serialize");
    let parsed = load_config_from_str(&rendered).expect("rendered defaults should parse");
    assert_eq!(parsed.cache.upload_capacity, config.cache.upload_capacity);
    assert_eq!(parsed.storage.database_path, config.storage.database_path);
}
