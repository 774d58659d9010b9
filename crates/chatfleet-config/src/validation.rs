// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::FleetConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &FleetConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &str, message: String| errors.push(ConfigError::invalid(field, message));

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(
            "service.log_level",
            format!(
                "`{}` must be one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path", "must not be empty".to_string());
    }

    if config.sync.group_batch_size == 0 {
        fail("sync.group_batch_size", "must be at least 1".to_string());
    }

    if config.sync.interval_secs == Some(0) {
        fail("sync.interval_secs", "must be positive when set".to_string());
    }

    if config.session.reconnect && config.session.reconnect_backoff_ms == 0 {
        fail(
            "session.reconnect_backoff_ms",
            "must be positive when reconnect is enabled".to_string(),
        );
    }

    if config.session.reconnect_max_backoff_ms < config.session.reconnect_backoff_ms {
        fail(
            "session.reconnect_max_backoff_ms",
            format!(
                "{} must not be below reconnect_backoff_ms ({})",
                config.session.reconnect_max_backoff_ms, config.session.reconnect_backoff_ms
            ),
        );
    }

    let url = config.bridge.url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        fail("bridge.url", format!("`{url}` must use ws:// or wss://"));
    }

    if config.bridge.request_timeout_secs == 0 {
        fail("bridge.request_timeout_secs", "must be positive".to_string());
    }

    if config.notify.capacity == 0 {
        fail("notify.capacity", "must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&FleetConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = FleetConfig::default();
        config.sync.group_batch_size = 0;
        config.bridge.url = "http://localhost".into();
        config.notify.capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = FleetConfig::default();
        config.service.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("service.log_level"));
    }
}
