// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Ferry relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Ferry configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FerryConfig {
    /// Process identity, logging and timezone.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Per-user session lifecycle and health monitoring.
    #[serde(default)]
    pub session: SessionConfig,

    /// Outbound send retries.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Album settle window.
    #[serde(default)]
    pub album: AlbumConfig,

    /// Processed-media and upload caches.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Bot-API notification surface.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Process identity and global behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Display name used in logs and the status command.
    #[serde(default = "default_relay_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Offset from UTC, in minutes, used by the day and working-hours filters.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// How long in-flight work may run after a shutdown signal.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: default_relay_name(),
            log_level: default_log_level(),
            utc_offset_minutes: 0,
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_relay_name() -> String {
    "ferry".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds between health checks of every live session.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    /// Connection attempts per start or reconnect.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// First reconnect backoff, doubled per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Ceiling for the reconnect backoff.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Extra wait added on top of a platform-reported rate limit.
    #[serde(default = "default_rate_limit_buffer_secs")]
    pub rate_limit_buffer_secs: u64,

    /// Maximum number of concurrent user sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval_secs(),
            connect_attempts: default_connect_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_secs: default_backoff_max_secs(),
            rate_limit_buffer_secs: default_rate_limit_buffer_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl SessionConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn rate_limit_buffer(&self) -> Duration {
        Duration::from_secs(self.rate_limit_buffer_secs)
    }
}

fn default_health_interval_secs() -> u64 {
    30
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_secs() -> u64 {
    300
}

fn default_rate_limit_buffer_secs() -> u64 {
    2
}

fn default_max_sessions() -> usize {
    100
}

/// Outbound send retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Attempts per target before the target is given up on.
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,

    /// First retry delay for transient failures, doubled per attempt.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_attempts: default_send_attempts(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl DeliveryConfig {
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

fn default_send_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

/// Album collection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlbumConfig {
    /// Quiet period after the last album item before the batch is sent.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// How long a delivered album id is remembered to suppress late items.
    #[serde(default = "default_processed_ttl_secs")]
    pub processed_ttl_secs: u64,
}

impl Default for AlbumConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            processed_ttl_secs: default_processed_ttl_secs(),
        }
    }
}

impl AlbumConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn processed_ttl(&self) -> Duration {
        Duration::from_secs(self.processed_ttl_secs)
    }
}

fn default_settle_ms() -> u64 {
    1500
}

fn default_processed_ttl_secs() -> u64 {
    600
}

/// Cache sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum processed-media entries held at once.
    #[serde(default = "default_media_capacity")]
    pub media_capacity: usize,

    /// Lifetime of a processed-media entry.
    #[serde(default = "default_media_ttl_secs")]
    pub media_ttl_secs: u64,

    /// Maximum remembered upload handles.
    #[serde(default = "default_upload_capacity")]
    pub upload_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            media_capacity: default_media_capacity(),
            media_ttl_secs: default_media_ttl_secs(),
            upload_capacity: default_upload_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn media_ttl(&self) -> Duration {
        Duration::from_secs(self.media_ttl_secs)
    }
}

fn default_media_capacity() -> usize {
    256
}

fn default_media_ttl_secs() -> u64 {
    3600
}

fn default_upload_capacity() -> usize {
    1024
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("ferry").join("ferry.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "ferry.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// Bot-API surface used for approval prompts, out-of-band buttons and failure notices.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot token. `None` disables the bot surface.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Chat that receives operator-level notices in addition to task owners.
    #[serde(default)]
    pub admin_chat_id: Option<i64>,
}
