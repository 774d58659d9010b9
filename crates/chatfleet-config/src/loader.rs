// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! `./chatfleet.toml` > `~/.config/chatfleet/chatfleet.toml` > `/etc/chatfleet/chatfleet.toml`,
//! with `CHATFLEET_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::FleetConfig;

/// Section names recognised in environment keys, e.g. `CHATFLEET_SYNC_GROUP_BATCH_SIZE`.
const ENV_SECTIONS: &[&str] = &[
    "service", "storage", "session", "sync", "media", "bridge", "notify",
];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatfleet/chatfleet.toml`
/// 3. `~/.config/chatfleet/chatfleet.toml`
/// 4. `./chatfleet.toml`
/// 5. `CHATFLEET_*` environment variables
pub fn load_config() -> Result<FleetConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<FleetConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FleetConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FleetConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FleetConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FleetConfig::default()))
        .merge(Toml::file("/etc/chatfleet/chatfleet.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatfleet/chatfleet.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatfleet.toml"))
        .merge(env_provider())
}

/// Maps `CHATFLEET_SECTION_KEY_NAME` to `section.key_name`.
///
/// Only the first underscore after a known section becomes a dot, so keys
/// that contain underscores keep them.
fn env_provider() -> Env {
    Env::prefixed("CHATFLEET_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(
            map_env_key("sync_group_batch_size"),
            "sync.group_batch_size"
        );
        assert_eq!(
            map_env_key("session_reconnect_max_attempts"),
            "session.reconnect_max_attempts"
        );
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn sync_section_does_not_swallow_other_prefixes() {
        assert_eq!(map_env_key("synced"), "synced");
    }
}
