// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media kinds, ingestion input and the normalized descriptor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Attachment category. Each kind maps to one registered strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    File,
    Video,
    Audio,
}

/// Raw attachment bytes plus what the caller knows about them.
#[derive(Debug, Clone, Default)]
pub struct MediaInput {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Destination thread as the sending tenant addresses it.
    pub thread_id: String,
    pub is_group: bool,
    pub duration_ms: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MediaInput {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            thread_id: thread_id.into(),
            ..Default::default()
        }
    }

    /// File extension of `filename`, lowercased, without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// What a strategy produced for one attachment.
///
/// Deferred kinds fill `file_path`; the caller deletes that file once the
/// message has been sent. Eager kinds fill `url` / `file_id` from the upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// SHA-256 of the bytes, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub size: u64,
}

impl MediaDescriptor {
    pub fn empty(kind: MediaKind, size: u64) -> Self {
        Self {
            kind,
            url: None,
            file_path: None,
            file_id: None,
            checksum: None,
            thumbnail: None,
            duration_ms: None,
            width: None,
            height: None,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_parses_lowercase() {
        assert_eq!(MediaKind::from_str("video").unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::Audio.to_string(), "audio");
        assert!(MediaKind::from_str("hologram").is_err());
    }

    #[test]
    fn extension_is_normalized() {
        let input = MediaInput::new(vec![], "Report.PDF", "U1");
        assert_eq!(input.extension().as_deref(), Some("pdf"));
        assert_eq!(MediaInput::new(vec![], "noext", "U1").extension(), None);
    }
}
