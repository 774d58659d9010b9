// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames exchanged with the sidecar.
//!
//! ```json
//! {"type": "req", "id": "…", "tenant": "t1", "method": "get_profile", "params": {"userId": "42"}}
//! {"type": "res", "id": "…", "ok": true, "result": {…}}
//! {"type": "res", "id": "…", "ok": false, "error": {"code": "not_found", "message": "…"}}
//! {"type": "event", "tenant": "t1", "event": "message", "payload": {…}}
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatfleet_core::RawEventKind;

/// Error code the sidecar uses for rejected credentials or QR logins.
pub const CODE_AUTH: &str = "auth";
/// Error code for lookups of unknown ids.
pub const CODE_NOT_FOUND: &str = "not_found";
/// Event carrying a login challenge for a pending interactive login.
pub const EVENT_QR: &str = "qr";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub id: String,
    pub tenant: String,
    pub method: String,
    pub params: Value,
}

impl RequestFrame {
    pub fn new(tenant: &str, method: &str, params: Value) -> Self {
        Self {
            frame_type: "req",
            id: uuid::Uuid::new_v4().to_string(),
            tenant: tenant.to_string(),
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventFrame {
    pub tenant: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Any frame the sidecar sends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Incoming {
    Res(ResponseFrame),
    Event(EventFrame),
}

/// Maps a sidecar event name onto the session event kind.
///
/// Accepts the snake_case kind names plus the platform's short aliases.
pub fn event_kind(name: &str) -> Option<RawEventKind> {
    match name {
        "group" => Some(RawEventKind::GroupEvent),
        "read" | "seen" => Some(RawEventKind::ReadReceipt),
        "recall" => Some(RawEventKind::Undo),
        other => RawEventKind::from_str(other).ok(),
    }
}
