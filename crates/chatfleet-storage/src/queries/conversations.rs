// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rows and the memberships that route tenants to them.

use chatfleet_core::{
    Conversation, ConversationKind, ConversationUpsert, FleetError, Membership, UpsertChange,
    Upserted,
};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::database::{Database, map_tr_err, new_id, parse_column};

const CONVERSATION_COLUMNS: &str = "c.id, c.canonical_id, c.canonical_durable, c.kind, c.name, \
                                    c.avatar, c.last_activity_at, c.last_message, c.created_at, \
                                    c.updated_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        canonical_id: row.get(1)?,
        canonical_durable: row.get(2)?,
        kind: parse_column::<ConversationKind>(3, row.get(3)?)?,
        name: row.get(4)?,
        avatar: row.get(5)?,
        last_activity_at: row.get(6)?,
        last_message: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub async fn get_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<Conversation>, FleetError> {
    let id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?1"),
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_canonical(
    db: &Database,
    canonical_id: &str,
) -> Result<Option<Conversation>, FleetError> {
    let canonical_id = canonical_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.canonical_id = ?1"
                ),
                params![canonical_id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Fast path: the tenant's own membership keyed by routing id.
pub async fn find_by_membership(
    db: &Database,
    tenant_id: &str,
    routing_id: &str,
) -> Result<Option<Conversation>, FleetError> {
    let tenant_id = tenant_id.to_string();
    let routing_id = routing_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations c
                     JOIN memberships m ON m.conversation_id = c.id
                     WHERE m.tenant_id = ?1 AND m.routing_id = ?2 AND m.is_self = 1
                     ORDER BY c.canonical_durable DESC, m.created_at LIMIT 1"
                ),
                params![tenant_id, routing_id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert by canonical id, upgrading a transient `previous_id` row in place.
///
/// If the durable row already exists (another tenant got there first), the
/// transient row is folded into it: memberships and messages move over,
/// duplicate messages merge their listener sets, and the transient row is
/// deleted. That case reports [`UpsertChange::Upgraded`].
pub async fn upsert_conversation(
    db: &Database,
    upsert: ConversationUpsert,
) -> Result<Upserted, FleetError> {
    let fresh_id = new_id();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM conversations WHERE canonical_id = ?1",
                    params![upsert.canonical_id],
                    |row| row.get(0),
                )
                .optional()?;

            let placeholder: Option<String> = match &upsert.previous_id {
                Some(prev) if upsert.durable && *prev != upsert.canonical_id => tx
                    .query_row(
                        "SELECT id FROM conversations WHERE canonical_id = ?1 AND canonical_durable = 0",
                        params![prev],
                        |row| row.get(0),
                    )
                    .optional()?,
                _ => None,
            };

            let result = if let Some(id) = existing {
                let folded = match &placeholder {
                    Some(stale) if *stale != id => {
                        fold_conversation(&tx, stale, &id)?;
                        true
                    }
                    _ => false,
                };
                tx.execute(
                    "UPDATE conversations SET
                         canonical_durable = MAX(canonical_durable, ?2),
                         name = COALESCE(?3, name),
                         avatar = COALESCE(?4, avatar),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, upsert.durable, upsert.name, upsert.avatar],
                )?;
                Upserted {
                    id,
                    change: if folded {
                        UpsertChange::Upgraded
                    } else {
                        UpsertChange::Refreshed
                    },
                }
            } else if let Some(id) = placeholder {
                tx.execute(
                    "UPDATE conversations SET
                         canonical_id = ?2,
                         canonical_durable = 1,
                         name = COALESCE(?3, name),
                         avatar = COALESCE(?4, avatar),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, upsert.canonical_id, upsert.name, upsert.avatar],
                )?;
                Upserted {
                    id,
                    change: UpsertChange::Upgraded,
                }
            } else {
                tx.execute(
                    "INSERT INTO conversations (id, canonical_id, canonical_durable, kind, name, avatar)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        fresh_id,
                        upsert.canonical_id,
                        upsert.durable,
                        upsert.kind.to_string(),
                        upsert.name,
                        upsert.avatar
                    ],
                )?;
                Upserted {
                    id: fresh_id,
                    change: UpsertChange::Created,
                }
            };

            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

fn fold_conversation(
    tx: &rusqlite::Transaction<'_>,
    stale: &str,
    target: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE OR IGNORE memberships SET conversation_id = ?2 WHERE conversation_id = ?1",
        params![stale, target],
    )?;
    tx.execute(
        "DELETE FROM memberships WHERE conversation_id = ?1",
        params![stale],
    )?;

    // Messages both rows hold: keep the durable copy, union the listeners.
    tx.execute(
        "INSERT OR IGNORE INTO message_listeners (message_id, tenant_id, observed_at)
         SELECT t.id, l.tenant_id, l.observed_at
         FROM messages s
         JOIN messages t ON t.conversation_id = ?2 AND t.remote_msg_id = s.remote_msg_id
         JOIN message_listeners l ON l.message_id = s.id
         WHERE s.conversation_id = ?1",
        params![stale, target],
    )?;
    tx.execute(
        "DELETE FROM message_listeners WHERE message_id IN (
             SELECT s.id FROM messages s
             JOIN messages t ON t.conversation_id = ?2 AND t.remote_msg_id = s.remote_msg_id
             WHERE s.conversation_id = ?1)",
        params![stale, target],
    )?;
    tx.execute(
        "DELETE FROM messages WHERE conversation_id = ?1 AND remote_msg_id IN (
             SELECT remote_msg_id FROM messages WHERE conversation_id = ?2)",
        params![stale, target],
    )?;
    tx.execute(
        "UPDATE messages SET conversation_id = ?2 WHERE conversation_id = ?1",
        params![stale, target],
    )?;

    tx.execute(
        "UPDATE conversations SET
             last_activity_at = (SELECT last_activity_at FROM conversations WHERE id = ?1),
             last_message = (SELECT last_message FROM conversations WHERE id = ?1)
         WHERE id = ?2
           AND COALESCE(last_activity_at, 0)
               < COALESCE((SELECT last_activity_at FROM conversations WHERE id = ?1), 0)",
        params![stale, target],
    )?;
    tx.execute("DELETE FROM conversations WHERE id = ?1", params![stale])?;
    debug!(stale, target, "folded transient conversation into durable row");
    Ok(())
}

pub async fn touch_conversation(
    db: &Database,
    conversation_id: &str,
    sent_at: i64,
    summary: &str,
) -> Result<(), FleetError> {
    let id = conversation_id.to_string();
    let summary = summary.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET
                     last_activity_at = ?2,
                     last_message = ?3,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND COALESCE(last_activity_at, 0) <= ?2",
                params![id, sent_at, summary],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_membership(db: &Database, membership: Membership) -> Result<(), FleetError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO memberships (conversation_id, identity_id, tenant_id, routing_id, is_self)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(conversation_id, identity_id, tenant_id) DO UPDATE SET
                     routing_id = excluded.routing_id,
                     is_self = excluded.is_self",
                params![
                    membership.conversation_id,
                    membership.identity_id,
                    membership.tenant_id,
                    membership.routing_id,
                    membership.is_self
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove_membership(
    db: &Database,
    conversation_id: &str,
    identity_id: &str,
    tenant_id: &str,
) -> Result<(), FleetError> {
    let conversation_id = conversation_id.to_string();
    let identity_id = identity_id.to_string();
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM memberships
                 WHERE conversation_id = ?1 AND identity_id = ?2 AND tenant_id = ?3",
                params![conversation_id, identity_id, tenant_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_memberships(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Membership>, FleetError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, identity_id, tenant_id, routing_id, is_self
                 FROM memberships WHERE conversation_id = ?1
                 ORDER BY tenant_id, is_self DESC, identity_id",
            )?;
            let rows = stmt
                .query_map(params![conversation_id], |row| {
                    Ok(Membership {
                        conversation_id: row.get(0)?,
                        identity_id: row.get(1)?,
                        tenant_id: row.get(2)?,
                        routing_id: row.get(3)?,
                        is_self: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::identities::upsert_identity;
    use crate::queries::tenants::upsert_tenant;
    use chatfleet_core::{IdentityKind, IdentityUpsert};

    fn group(canonical: &str, durable: bool, previous: Option<&str>) -> ConversationUpsert {
        ConversationUpsert {
            canonical_id: canonical.into(),
            durable,
            previous_id: previous.map(str::to_string),
            kind: ConversationKind::Group,
            name: Some("Team".into()),
            avatar: None,
        }
    }

    async fn bot_identity(db: &Database) -> String {
        upsert_identity(
            db,
            IdentityUpsert {
                canonical_id: "G-self".into(),
                durable: true,
                previous_id: None,
                display_name: None,
                avatar: None,
                kind: IdentityKind::Bot,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn upgrade_keeps_id_and_membership_still_resolves() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_tenant(&db, "t1", None).await.unwrap();
        let me = bot_identity(&db).await;

        let created = upsert_conversation(&db, group("5550001", false, None))
            .await
            .unwrap();
        upsert_membership(
            &db,
            Membership {
                conversation_id: created.id.clone(),
                identity_id: me,
                tenant_id: "t1".into(),
                routing_id: "5550001".into(),
                is_self: true,
            },
        )
        .await
        .unwrap();

        let upgraded = upsert_conversation(&db, group("GG-xyz", true, Some("5550001")))
            .await
            .unwrap();
        assert_eq!(upgraded.change, UpsertChange::Upgraded);
        assert_eq!(upgraded.id, created.id);

        let via_route = find_by_membership(&db, "t1", "5550001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(via_route.id, created.id);
        assert_eq!(via_route.canonical_id, "GG-xyz");
        assert!(via_route.canonical_durable);
    }

    #[tokio::test]
    async fn durable_row_is_not_downgraded() {
        let db = Database::open_in_memory().await.unwrap();
        let id = upsert_conversation(&db, group("GG-1", true, None))
            .await
            .unwrap()
            .id;
        upsert_conversation(&db, group("GG-1", false, None))
            .await
            .unwrap();
        let c = get_conversation(&db, &id).await.unwrap().unwrap();
        assert!(c.canonical_durable);
    }

    #[tokio::test]
    async fn touch_never_moves_backwards() {
        let db = Database::open_in_memory().await.unwrap();
        let id = upsert_conversation(&db, group("GG-1", true, None))
            .await
            .unwrap()
            .id;
        touch_conversation(&db, &id, 2_000, "newer").await.unwrap();
        touch_conversation(&db, &id, 1_000, "older").await.unwrap();
        let c = get_conversation(&db, &id).await.unwrap().unwrap();
        assert_eq!(c.last_activity_at, Some(2_000));
        assert_eq!(c.last_message.as_deref(), Some("newer"));
    }

    #[tokio::test]
    async fn membership_removal() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_tenant(&db, "t1", None).await.unwrap();
        let me = bot_identity(&db).await;
        let conv = upsert_conversation(&db, group("GG-1", true, None))
            .await
            .unwrap()
            .id;
        upsert_membership(
            &db,
            Membership {
                conversation_id: conv.clone(),
                identity_id: me.clone(),
                tenant_id: "t1".into(),
                routing_id: "GG-1".into(),
                is_self: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(list_memberships(&db, &conv).await.unwrap().len(), 1);

        remove_membership(&db, &conv, &me, "t1").await.unwrap();
        assert!(list_memberships(&db, &conv).await.unwrap().is_empty());
        assert!(find_by_membership(&db, "t1", "GG-1").await.unwrap().is_none());
    }
}
