// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shapes exchanged with the chat platform client.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A user profile fetched from the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    /// Routable numeric id as seen by the fetching tenant.
    pub user_id: String,
    /// Durable cross-tenant id, when the platform exposes one.
    #[serde(default)]
    pub global_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_friend: bool,
}

impl RemoteProfile {
    /// The best available canonical id and whether it is durable.
    pub fn canonical_id(&self) -> (String, bool) {
        canonical(&self.global_id, &self.user_id)
    }
}

/// A group profile fetched from the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGroupProfile {
    pub group_id: String,
    #[serde(default)]
    pub global_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

impl RemoteGroupProfile {
    pub fn canonical_id(&self) -> (String, bool) {
        canonical(&self.global_id, &self.group_id)
    }
}

fn canonical(global: &Option<String>, numeric: &str) -> (String, bool) {
    match global.as_deref().map(str::trim) {
        Some(g) if !g.is_empty() => (g.to_string(), true),
        _ => (numeric.to_string(), false),
    }
}

/// Metadata sent alongside bytes on an eager upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMeta {
    /// `video`, `audio`, ...
    pub kind: String,
    pub filename: String,
    pub thread_id: String,
    pub is_group: bool,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

/// Reference returned by the platform after an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMediaRef {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Event category emitted by a live session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RawEventKind {
    Message,
    GroupEvent,
    Undo,
    Reaction,
    Typing,
    ReadReceipt,
    /// Transport-level failure on a still-open session.
    Error,
    /// The event stream ended; the session is gone.
    Closed,
}

/// An untyped event straight from the platform client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub payload: serde_json::Value,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }
}
