// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the chatfleet session service.
//!
//! TOML files in the usual hierarchy, `CHATFLEET_` environment overrides,
//! strict unknown-key rejection, and miette diagnostics with typo suggestions.
//!
//! ```no_run
//! use chatfleet_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("group batch size: {}", config.sync.group_batch_size);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, SourceFile, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::FleetConfig;

/// Load configuration from the file hierarchy and validate it.
pub fn load_and_validate() -> Result<FleetConfig, Vec<ConfigError>> {
    checked(loader::load_config(), hierarchy_sources)
}

/// Load and validate an explicit config file (plus env overrides).
pub fn load_and_validate_path(path: &Path) -> Result<FleetConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Load and validate an inline TOML string.
pub fn load_and_validate_str(toml_content: &str) -> Result<FleetConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![SourceFile::new("<inline>", toml_content)]
    })
}

/// Sources are only read back when the load failed and spans are wanted.
fn checked(
    loaded: Result<FleetConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<SourceFile>,
) -> Result<FleetConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| ConfigError::from_figment(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn read_source(path: &Path) -> Option<SourceFile> {
    let content = std::fs::read_to_string(path).ok()?;
    Some(SourceFile::new(path.display().to_string(), content))
}

fn hierarchy_sources() -> Vec<SourceFile> {
    let local = std::env::current_dir()
        .map(|dir| dir.join("chatfleet.toml"))
        .unwrap_or_else(|_| "chatfleet.toml".into());
    let user = dirs::config_dir().map(|dir| dir.join("chatfleet").join("chatfleet.toml"));

    [Some(local), user, Some("/etc/chatfleet/chatfleet.toml".into())]
        .into_iter()
        .flatten()
        .filter_map(|path: std::path::PathBuf| read_source(&path))
        .collect()
}
