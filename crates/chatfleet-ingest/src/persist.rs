// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent message persistence and the follow-up notification.

use serde_json::{Value, json};
use tracing::{debug, warn};

use chatfleet_core::{
    DeliveryStatus, FleetError, FleetStore, NewMessage, NotificationSink, PersistOutcome,
    conversation_topic,
};
use chatfleet_normalizer::CanonicalMessage;
use chatfleet_resolver::Resolution;

use crate::recording;

/// Builds the storage row for a resolved message.
///
/// Messages without a platform timestamp are stamped with the current time.
pub fn to_new_message(
    msg: &CanonicalMessage,
    resolution: &Resolution,
    raw: &Value,
) -> Result<NewMessage, FleetError> {
    let content = serde_json::to_value(&msg.content)
        .map_err(|e| FleetError::Internal(format!("content serialization failed: {e}")))?;
    Ok(NewMessage {
        conversation_id: resolution.conversation.id().to_string(),
        remote_msg_id: msg.remote_msg_id.clone(),
        client_msg_id: msg.client_msg_id.clone(),
        sender_identity_id: resolution.sender.id().to_string(),
        sender_kind: resolution.sender_kind,
        content,
        content_type: msg.content.content_type().to_string(),
        raw: Some(raw.clone()),
        sent_at: msg
            .sent_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        delivery: if resolution.self_sent {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Received
        },
        quote_remote_id: msg.quote.as_ref().map(|q| q.remote_msg_id.clone()),
    })
}

/// Writes `message` for `tenant_id`.
///
/// Only a first observation updates the conversation's activity and
/// publishes a notification; merges are silent.
pub async fn persist_and_notify(
    store: &dyn FleetStore,
    sink: &dyn NotificationSink,
    tenant_id: &str,
    message: NewMessage,
    summary: &str,
) -> Result<PersistOutcome, FleetError> {
    let notification = json!({
        "event": "message",
        "tenantId": tenant_id,
        "conversationId": message.conversation_id,
        "message": {
            "remoteMsgId": message.remote_msg_id,
            "clientMsgId": message.client_msg_id,
            "senderIdentityId": message.sender_identity_id,
            "senderKind": message.sender_kind,
            "contentType": message.content_type,
            "content": message.content,
            "sentAt": message.sent_at,
            "delivery": message.delivery,
            "quoteRemoteId": message.quote_remote_id,
        },
    });
    let conversation_id = message.conversation_id.clone();
    let sent_at = message.sent_at;

    let outcome = store.persist_message(tenant_id, message).await?;
    match &outcome {
        PersistOutcome::Inserted { message_id } => {
            recording::record_message("inserted");
            store
                .touch_conversation(&conversation_id, sent_at, summary)
                .await?;
            let mut notification = notification;
            notification["message"]["id"] = Value::String(message_id.clone());
            notify(
                sink,
                &conversation_topic(tenant_id, &conversation_id),
                notification,
            )
            .await;
        }
        PersistOutcome::Merged { message_id } => {
            recording::record_message("merged");
            debug!(%tenant_id, %message_id, "tenant added to listener set");
        }
        PersistOutcome::AlreadyObserved { message_id } => {
            recording::record_message("already_observed");
            debug!(%tenant_id, %message_id, "duplicate delivery ignored");
        }
    }
    Ok(outcome)
}

/// Best-effort publish. Failures are logged and counted, never returned.
pub async fn notify(sink: &dyn NotificationSink, topic: &str, payload: Value) {
    if let Err(e) = sink.publish(topic, payload).await {
        recording::record_notification_failure();
        warn!(%topic, error = %e, "notification failed");
    }
}
