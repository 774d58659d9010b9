// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transient on-disk store for attachments in flight.

use std::path::{Path, PathBuf};

use chatfleet_config::model::MediaConfig;
use chatfleet_core::FleetError;
use tracing::{debug, warn};

/// Directory where attachment bytes are staged with UUID-based names.
#[derive(Debug, Clone)]
pub struct TransientStore {
    dir: PathBuf,
}

impl TransientStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Uses `media.temp_dir`, or `<system temp>/chatfleet-media` when unset.
    pub fn from_config(config: &MediaConfig) -> Self {
        match &config.temp_dir {
            Some(dir) => Self::new(dir),
            None => Self::new(std::env::temp_dir().join("chatfleet-media")),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` to a fresh file, keeping `extension` when given.
    pub async fn write(&self, bytes: &[u8], extension: Option<&str>) -> Result<PathBuf, FleetError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| media_io("failed to create media temp dir", e))?;

        let id = uuid::Uuid::new_v4();
        let name = match extension {
            Some(ext) if !ext.is_empty() => format!("{id}.{ext}"),
            _ => id.to_string(),
        };
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| media_io("failed to write media temp file", e))?;
        debug!(path = %path.display(), size = bytes.len(), "staged media");
        Ok(path)
    }

    /// Removes a staged file. Missing files are not an error.
    pub async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed staged media"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staged media"),
        }
    }
}

fn media_io(message: &str, err: std::io::Error) -> FleetError {
    FleetError::Media {
        message: message.to_string(),
        source: Some(Box::new(err)),
    }
}
