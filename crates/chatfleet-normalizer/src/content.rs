// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical message model.

use serde::{Deserialize, Serialize};

use crate::rich_text::TextSegment;

/// A normalized inbound message with its routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    /// Platform message id; a payload digest when the platform omits it.
    pub remote_msg_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    /// Remote id of the sender. May be empty on self-sent messages.
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Remote id of the thread as the receiving tenant addresses it.
    pub thread_id: String,
    pub is_group: bool,
    /// Sent by the tenant account itself (possibly from another device).
    pub is_self: bool,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    pub content: MessageContent,
}

/// A quoted (replied-to) message reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub remote_msg_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Tagged message body. Serialized as `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
        /// Present only when the platform attached style ranges.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        segments: Vec<TextSegment>,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Sticker {
        sticker_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Voice {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    File {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
    },
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thumbnail: Option<String>,
    },
    /// Recall of an earlier message.
    Undo {
        target_msg_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_client_msg_id: Option<String>,
    },
    Reaction {
        target_msg_id: String,
        emoji: String,
    },
    /// Anything the normalizer does not understand, kept with its raw payload.
    Unknown {
        msg_type: String,
        raw: serde_json::Value,
    },
}

const SUMMARY_MAX_CHARS: usize = 120;

impl MessageContent {
    /// The `type` tag.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Sticker { .. } => "sticker",
            Self::Voice { .. } => "voice",
            Self::Video { .. } => "video",
            Self::File { .. } => "file",
            Self::Link { .. } => "link",
            Self::Undo { .. } => "undo",
            Self::Reaction { .. } => "reaction",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// One-line preview for conversation lists and notifications.
    pub fn summary(&self) -> String {
        match self {
            Self::Text { text, .. } => truncate(text, SUMMARY_MAX_CHARS),
            Self::Image { caption, .. } => match caption {
                Some(c) if !c.is_empty() => format!("[image] {}", truncate(c, SUMMARY_MAX_CHARS)),
                _ => "[image]".to_string(),
            },
            Self::Sticker { .. } => "[sticker]".to_string(),
            Self::Voice { .. } => "[voice]".to_string(),
            Self::Video { .. } => "[video]".to_string(),
            Self::File { name, .. } => match name {
                Some(n) => format!("[file] {n}"),
                None => "[file]".to_string(),
            },
            Self::Link { title, url, .. } => {
                format!("[link] {}", title.as_deref().unwrap_or(url))
            }
            Self::Undo { .. } => "[recalled]".to_string(),
            Self::Reaction { emoji, .. } => format!("reacted {emoji}"),
            Self::Unknown { msg_type, .. } => format!("[unsupported: {msg_type}]"),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
