// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent message writes with listener-set merging.

use chatfleet_core::{
    DeliveryStatus, FleetError, IdentityKind, NewMessage, PersistOutcome, StoredMessage,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, new_id, parse_column};

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.remote_msg_id, m.client_msg_id, \
                               m.sender_identity_id, m.sender_kind, m.content, m.content_type, \
                               m.sent_at, m.recalled, m.delivery, m.quote_remote_id, m.created_at, \
                               (SELECT group_concat(l.tenant_id, char(31)) FROM \
                                  (SELECT tenant_id FROM message_listeners \
                                   WHERE message_id = m.id ORDER BY observed_at, tenant_id) l)";

/// Separator used by `group_concat` for the listener column.
const LISTENER_SEP: char = '\u{1f}';

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let content: String = row.get(6)?;
    let content = serde_json::from_str(&content).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let listeners: Option<String> = row.get(13)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        remote_msg_id: row.get(2)?,
        client_msg_id: row.get(3)?,
        sender_identity_id: row.get(4)?,
        sender_kind: parse_column::<IdentityKind>(5, row.get(5)?)?,
        content,
        content_type: row.get(7)?,
        sent_at: row.get(8)?,
        recalled: row.get(9)?,
        delivery: parse_column::<DeliveryStatus>(10, row.get(10)?)?,
        quote_remote_id: row.get(11)?,
        created_at: row.get(12)?,
        listening_tenants: listeners
            .map(|s| s.split(LISTENER_SEP).map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

/// Insert the message, or add `tenant_id` to the listener set of the existing row.
///
/// Existing content is never overwritten.
pub async fn persist_message(
    db: &Database,
    tenant_id: &str,
    message: NewMessage,
) -> Result<PersistOutcome, FleetError> {
    let tenant_id = tenant_id.to_string();
    let content = serde_json::to_string(&message.content).map_err(FleetError::storage)?;
    let raw = message
        .raw
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(FleetError::storage)?;
    let fresh_id = new_id();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM messages WHERE conversation_id = ?1 AND remote_msg_id = ?2",
                    params![message.conversation_id, message.remote_msg_id],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = match existing {
                None => {
                    tx.execute(
                        "INSERT INTO messages (id, conversation_id, remote_msg_id, client_msg_id,
                             sender_identity_id, sender_kind, content, content_type, raw, sent_at,
                             delivery, quote_remote_id)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        params![
                            fresh_id,
                            message.conversation_id,
                            message.remote_msg_id,
                            message.client_msg_id,
                            message.sender_identity_id,
                            message.sender_kind.to_string(),
                            content,
                            message.content_type,
                            raw,
                            message.sent_at,
                            message.delivery.to_string(),
                            message.quote_remote_id
                        ],
                    )?;
                    tx.execute(
                        "INSERT INTO message_listeners (message_id, tenant_id) VALUES (?1, ?2)",
                        params![fresh_id, tenant_id],
                    )?;
                    PersistOutcome::Inserted {
                        message_id: fresh_id,
                    }
                }
                Some(message_id) => {
                    let added = tx.execute(
                        "INSERT OR IGNORE INTO message_listeners (message_id, tenant_id)
                         VALUES (?1, ?2)",
                        params![message_id, tenant_id],
                    )?;
                    if added == 1 {
                        PersistOutcome::Merged { message_id }
                    } else {
                        PersistOutcome::AlreadyObserved { message_id }
                    }
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(
    db: &Database,
    conversation_id: &str,
    remote_msg_id: &str,
) -> Result<Option<StoredMessage>, FleetError> {
    let conversation_id = conversation_id.to_string();
    let remote_msg_id = remote_msg_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     WHERE m.conversation_id = ?1 AND m.remote_msg_id = ?2"
                ),
                params![conversation_id, remote_msg_id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Newest messages first.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<StoredMessage>, FleetError> {
    let conversation_id = conversation_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 WHERE m.conversation_id = ?1
                 ORDER BY m.sent_at DESC, m.created_at DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![conversation_id, limit], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_recalled(
    db: &Database,
    conversation_id: &str,
    remote_msg_id: &str,
) -> Result<bool, FleetError> {
    let conversation_id = conversation_id.to_string();
    let remote_msg_id = remote_msg_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET recalled = 1
                 WHERE conversation_id = ?1 AND (remote_msg_id = ?2 OR client_msg_id = ?2)
                   AND recalled = 0",
                params![conversation_id, remote_msg_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations::upsert_conversation;
    use crate::queries::identities::upsert_identity;
    use chatfleet_core::{ConversationKind, ConversationUpsert, IdentityUpsert};
    use serde_json::json;

    async fn fixture(db: &Database) -> (String, String) {
        let sender = upsert_identity(
            db,
            IdentityUpsert {
                canonical_id: "G-u1".into(),
                durable: true,
                previous_id: None,
                display_name: None,
                avatar: None,
                kind: IdentityKind::Customer,
            },
        )
        .await
        .unwrap()
        .id;
        let conversation = upsert_conversation(
            db,
            ConversationUpsert {
                canonical_id: "GG-team".into(),
                durable: true,
                previous_id: None,
                kind: ConversationKind::Group,
                name: None,
                avatar: None,
            },
        )
        .await
        .unwrap()
        .id;
        (sender, conversation)
    }

    fn text(conversation: &str, sender: &str, remote: &str, body: &str) -> NewMessage {
        NewMessage {
            conversation_id: conversation.into(),
            remote_msg_id: remote.into(),
            client_msg_id: Some(format!("c-{remote}")),
            sender_identity_id: sender.into(),
            sender_kind: IdentityKind::Customer,
            content: json!({"type": "text", "text": body}),
            content_type: "text".into(),
            raw: None,
            sent_at: 1_700_000_000_000,
            delivery: DeliveryStatus::Received,
            quote_remote_id: None,
        }
    }

    #[tokio::test]
    async fn replay_is_idempotent_and_merges_listeners() {
        let db = Database::open_in_memory().await.unwrap();
        let (sender, conv) = fixture(&db).await;

        let first = persist_message(&db, "t1", text(&conv, &sender, "m1", "hello"))
            .await
            .unwrap();
        assert!(first.is_inserted());

        let replay = persist_message(&db, "t1", text(&conv, &sender, "m1", "hello"))
            .await
            .unwrap();
        assert_eq!(
            replay,
            PersistOutcome::AlreadyObserved {
                message_id: first.message_id().to_string()
            }
        );

        let other = persist_message(&db, "t2", text(&conv, &sender, "m1", "overwritten?"))
            .await
            .unwrap();
        assert!(matches!(other, PersistOutcome::Merged { .. }));

        let stored = get_message(&db, &conv, "m1").await.unwrap().unwrap();
        assert_eq!(stored.listening_tenants, vec!["t1", "t2"]);
        assert_eq!(stored.content, json!({"type": "text", "text": "hello"}));
        assert_eq!(list_messages(&db, &conv, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recall_by_remote_or_client_id() {
        let db = Database::open_in_memory().await.unwrap();
        let (sender, conv) = fixture(&db).await;
        persist_message(&db, "t1", text(&conv, &sender, "m1", "oops"))
            .await
            .unwrap();

        assert!(mark_recalled(&db, &conv, "c-m1").await.unwrap());
        assert!(!mark_recalled(&db, &conv, "m1").await.unwrap(), "already recalled");
        assert!(!mark_recalled(&db, &conv, "missing").await.unwrap());
        let stored = get_message(&db, &conv, "m1").await.unwrap().unwrap();
        assert!(stored.recalled);
    }
}
