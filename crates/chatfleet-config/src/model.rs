// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a typo in a config file
//! fails at startup with a suggestion instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level chatfleet configuration.
///
/// Every section is optional and falls back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Tenant session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Contact and group reconciliation settings.
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub media: MediaConfig,

    /// Sidecar bridge hosting the chat platform client.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// In-process realtime bus.
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "chatfleet".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

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
        .map(|p| p.join("chatfleet").join("chatfleet.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatfleet.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Resume every tenant with saved credentials when the service starts.
    #[serde(default = "default_true")]
    pub restore_on_start: bool,

    /// Re-login with stored credentials after the transport closes.
    #[serde(default = "default_true")]
    pub reconnect: bool,

    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Initial reconnect delay; doubles per attempt.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Upper bound for the reconnect delay.
    #[serde(default = "default_reconnect_max_backoff_ms")]
    pub reconnect_max_backoff_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restore_on_start: true,
            reconnect: true,
            reconnect_max_attempts: default_reconnect_max_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            reconnect_max_backoff_ms: default_reconnect_max_backoff_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

fn default_reconnect_backoff_ms() -> u64 {
    1_000
}

fn default_reconnect_max_backoff_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Number of group ids fetched per remote call.
    #[serde(default = "default_group_batch_size")]
    pub group_batch_size: usize,

    /// Run a full sync for every logged-in tenant on this interval. `None` disables it.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            group_batch_size: default_group_batch_size(),
            interval_secs: None,
        }
    }
}

fn default_group_batch_size() -> usize {
    50
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Directory for transient media files. Defaults to the system temp dir.
    #[serde(default)]
    pub temp_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// WebSocket URL of the sidecar (`ws://` or `wss://`).
    #[serde(default = "default_bridge_url")]
    pub url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8799/bridge".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    /// Broadcast buffer size; slow subscribers beyond it lose notifications.
    #[serde(default = "default_notify_capacity")]
    pub capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            capacity: default_notify_capacity(),
        }
    }
}

fn default_notify_capacity() -> usize {
    1024
}
