// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw platform payload to [`CanonicalMessage`].

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::content::{CanonicalMessage, MessageContent, Quote};
use crate::raw::{
    as_object, bool_field, flatten_envelope, i64_field, object_field, str_field, u32_field,
    u64_field,
};
use crate::rich_text::{parse_ranges, segment};

/// Thread kind value the platform uses for groups in the envelope `type`.
const GROUP_THREAD_TYPE: i64 = 1;

/// Normalizes a message payload. `None` when the payload cannot be routed.
pub fn normalize(payload: &Value) -> Option<CanonicalMessage> {
    normalize_as(payload, None)
}

/// Like [`normalize`], using `type_hint` when the payload carries no `msgType`.
///
/// Recall and reaction events arrive on their own channels without a type,
/// so the listener passes `"undo"` / `"reaction"` here.
pub fn normalize_as(payload: &Value, type_hint: Option<&str>) -> Option<CanonicalMessage> {
    let flat = Value::Object(flatten_envelope(payload)?);

    let is_self = bool_field(&flat, &["isSelf", "is_self"]).unwrap_or(false);
    let is_group = bool_field(&flat, &["isGroup", "is_group"])
        .or_else(|| match flat.get("threadType") {
            Some(Value::String(s)) => Some(s.eq_ignore_ascii_case("group")),
            Some(v) => v.as_i64().map(|t| t == GROUP_THREAD_TYPE),
            None => None,
        })
        .unwrap_or(false);

    let sender_id = match str_field(&flat, &["uidFrom", "senderId", "fromId"]) {
        Some(id) => id,
        None if is_self => String::new(),
        None => {
            debug!("payload without sender, ignoring");
            return None;
        }
    };

    let to_id = str_field(&flat, &["idTo", "toId"]);
    let thread_id = match str_field(&flat, &["threadId", "thread_id"]) {
        Some(explicit) => explicit,
        None if is_group || is_self => to_id?,
        None if !sender_id.is_empty() => sender_id.clone(),
        None => return None,
    };

    let msg_type = str_field(&flat, &["msgType", "msg_type"])
        .or_else(|| type_hint.map(str::to_string))
        .unwrap_or_else(|| "text".to_string());

    let content = build_content(&msg_type, &flat, payload);

    let remote_msg_id = str_field(&flat, &["msgId", "globalMsgId", "msg_id"])
        .unwrap_or_else(|| payload_digest(payload));

    Some(CanonicalMessage {
        remote_msg_id,
        client_msg_id: str_field(&flat, &["cliMsgId", "clientMsgId"]),
        sender_id,
        sender_name: str_field(&flat, &["dName", "senderName"]),
        thread_id,
        is_group,
        is_self,
        sent_at: i64_field(&flat, &["ts", "timestamp"]),
        quote: parse_quote(&flat),
        content,
    })
}

/// Deterministic id for payloads without one, so replays stay idempotent.
fn payload_digest(payload: &Value) -> String {
    let digest = Sha256::digest(payload.to_string().as_bytes());
    format!("h:{}", &hex::encode(digest)[..32])
}

fn parse_quote(flat: &Value) -> Option<Quote> {
    let quote = object_field(flat, "quote")?;
    let remote_msg_id = str_field(&quote, &["globalMsgId", "msgId"])?;
    Some(Quote {
        remote_msg_id,
        client_msg_id: str_field(&quote, &["cliMsgId"]),
        sender_id: str_field(&quote, &["ownerId", "uidFrom"]),
        text: str_field(&quote, &["msg", "text"]),
    })
}

fn build_content(msg_type: &str, flat: &Value, original: &Value) -> MessageContent {
    let unknown = || MessageContent::Unknown {
        msg_type: msg_type.to_string(),
        raw: original.clone(),
    };
    let body = flat.get("content").cloned().unwrap_or(Value::Null);

    let built = match msg_type {
        "text" | "webchat" | "chat.text" => text_content(&body, flat),
        "image" | "photo" | "chat.photo" => as_object(&body).and_then(|c| image_content(&c)),
        "sticker" | "chat.sticker" => as_object(&body).and_then(|c| sticker_content(&c)),
        "voice" | "audio" | "chat.voice" => as_object(&body).and_then(|c| voice_content(&c)),
        "video" | "chat.video.msg" => as_object(&body).and_then(|c| video_content(&c)),
        "file" | "share.file" => as_object(&body).and_then(|c| file_content(&c)),
        "link" | "chat.link" | "chat.recommended" => {
            as_object(&body).and_then(|c| link_content(&c))
        }
        "undo" | "chat.undo" => undo_content(&body, flat),
        "reaction" | "chat.reaction" => reaction_content(&body, flat),
        _ => None,
    };

    built.unwrap_or_else(|| {
        debug!(msg_type, "unrecognised or malformed content, keeping raw payload");
        unknown()
    })
}

fn text_content(body: &Value, flat: &Value) -> Option<MessageContent> {
    let text = match body {
        Value::String(s) => s.clone(),
        Value::Object(_) => str_field(body, &["text", "msg"])?,
        _ => return None,
    };

    let styles = object_field(flat, "textProperties")
        .and_then(|props| props.get("styles").cloned())
        .or_else(|| flat.get("styles").cloned())
        .map(|styles| match styles {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::Null),
            other => other,
        });
    let segments = styles
        .map(|styles| parse_ranges(&styles))
        .filter(|ranges| !ranges.is_empty())
        .map(|ranges| segment(&text, &ranges))
        .unwrap_or_default();

    Some(MessageContent::Text { text, segments })
}

fn params(content: &Value) -> Value {
    object_field(content, "params").unwrap_or(Value::Null)
}

fn image_content(c: &Value) -> Option<MessageContent> {
    let p = params(c);
    Some(MessageContent::Image {
        url: str_field(c, &["href", "url", "hdUrl", "normalUrl"])?,
        thumbnail: str_field(c, &["thumb", "thumbUrl"]),
        width: u32_field(&p, &["width"]).or_else(|| u32_field(c, &["width"])),
        height: u32_field(&p, &["height"]).or_else(|| u32_field(c, &["height"])),
        caption: str_field(c, &["title", "description"]),
    })
}

fn sticker_content(c: &Value) -> Option<MessageContent> {
    Some(MessageContent::Sticker {
        sticker_id: str_field(c, &["id", "stickerId"])?,
        category_id: str_field(c, &["catId", "cateId", "categoryId"]),
        url: str_field(c, &["url", "stickerUrl"]),
    })
}

fn voice_content(c: &Value) -> Option<MessageContent> {
    let p = params(c);
    Some(MessageContent::Voice {
        url: str_field(c, &["href", "url"])?,
        duration_ms: u64_field(&p, &["duration"]).or_else(|| u64_field(c, &["duration"])),
    })
}

fn video_content(c: &Value) -> Option<MessageContent> {
    let p = params(c);
    Some(MessageContent::Video {
        url: str_field(c, &["href", "url"])?,
        thumbnail: str_field(c, &["thumb", "thumbUrl"]),
        duration_ms: u64_field(&p, &["duration"]).or_else(|| u64_field(c, &["duration"])),
        width: u32_field(&p, &["video_width", "width"]),
        height: u32_field(&p, &["video_height", "height"]),
    })
}

fn file_content(c: &Value) -> Option<MessageContent> {
    let p = params(c);
    Some(MessageContent::File {
        url: str_field(c, &["href", "url"])?,
        name: str_field(c, &["title", "fileName"]),
        size: u64_field(&p, &["fileSize"]).or_else(|| u64_field(c, &["fileSize", "size"])),
        extension: str_field(&p, &["fileExt"]).or_else(|| str_field(c, &["fileExt"])),
        checksum: str_field(&p, &["checksum"]),
    })
}

fn link_content(c: &Value) -> Option<MessageContent> {
    Some(MessageContent::Link {
        url: str_field(c, &["href", "url"])?,
        title: str_field(c, &["title"]),
        description: str_field(c, &["description"]),
        thumbnail: str_field(c, &["thumb", "thumbUrl"]),
    })
}

fn undo_content(body: &Value, flat: &Value) -> Option<MessageContent> {
    let c = as_object(body).unwrap_or(Value::Null);
    let target = str_field(&c, &["globalMsgId", "msgId"])
        .or_else(|| str_field(flat, &["targetMsgId", "undoMsgId"]))?;
    Some(MessageContent::Undo {
        target_msg_id: target,
        target_client_msg_id: str_field(&c, &["cliMsgId"]),
    })
}

fn reaction_content(body: &Value, flat: &Value) -> Option<MessageContent> {
    let c = as_object(body).unwrap_or(Value::Null);
    let target = c
        .get("rMsg")
        .and_then(Value::as_array)
        .and_then(|targets| targets.first())
        .and_then(|first| str_field(first, &["gMsgID", "globalMsgId"]))
        .or_else(|| str_field(&c, &["targetMsgId", "msgId"]))
        .or_else(|| str_field(flat, &["targetMsgId"]))?;
    let emoji = str_field(&c, &["rIcon", "emoji", "icon"])?;
    Some(MessageContent::Reaction {
        target_msg_id: target,
        emoji,
    })
}
