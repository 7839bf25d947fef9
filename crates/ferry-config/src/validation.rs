// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, timezone bounds, and non-zero intervals.

use crate::diagnostic::ConfigError;
use crate::model::FerryConfig;

/// Largest real-world UTC offset, in minutes (UTC+14:00).
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Longest allowed album settle window.
const MAX_SETTLE_MS: u64 = 60_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &FerryConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.relay.name.trim().is_empty() {
        errors.push(invalid("relay.name", "must not be empty"));
    }

    if !LOG_LEVELS.contains(&config.relay.log_level.as_str()) {
        errors.push(invalid(
            "relay.log_level",
            format!(
                "`{}` is not one of {}",
                config.relay.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.relay.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        errors.push(invalid(
            "relay.utc_offset_minutes",
            format!(
                "must be within ±{MAX_UTC_OFFSET_MINUTES}, got {}",
                config.relay.utc_offset_minutes
            ),
        ));
    }

    let nonzero = [
        ("session.health_interval_secs", config.session.health_interval_secs),
        ("session.connect_attempts", u64::from(config.session.connect_attempts)),
        ("session.backoff_base_ms", config.session.backoff_base_ms),
        ("session.max_sessions", config.session.max_sessions as u64),
        ("delivery.send_attempts", u64::from(config.delivery.send_attempts)),
        ("album.settle_ms", config.album.settle_ms),
        ("cache.media_capacity", config.cache.media_capacity as u64),
        ("cache.media_ttl_secs", config.cache.media_ttl_secs),
        ("cache.upload_capacity", config.cache.upload_capacity as u64),
    ];
    for (key, value) in nonzero {
        if value == 0 {
            errors.push(invalid(key, "must be greater than zero"));
        }
    }

    if config.session.backoff_max() < config.session.backoff_base() {
        errors.push(invalid(
            "session.backoff_max_secs",
            format!(
                "{}s is shorter than session.backoff_base_ms ({}ms)",
                config.session.backoff_max_secs, config.session.backoff_base_ms
            ),
        ));
    }

    if config.album.settle_ms > MAX_SETTLE_MS {
        errors.push(invalid(
            "album.settle_ms",
            format!("must be at most {MAX_SETTLE_MS}, got {}", config.album.settle_ms),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(invalid("storage.database_path", "must not be empty"));
    }

    if let Some(token) = &config.telegram.bot_token {
        if token.trim().is_empty() {
            errors.push(invalid("telegram.bot_token", "must not be empty when set"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
