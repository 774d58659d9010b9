// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity rows and the tenant-scoped connection edges that point at them.

use chatfleet_core::{
    Connection, FleetError, Identity, IdentityKind, IdentityUpsert, UpsertChange, Upserted,
};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::database::{Database, map_tr_err, new_id, parse_column};

const IDENTITY_COLUMNS: &str = "i.id, i.canonical_id, i.canonical_durable, i.display_name, \
                                i.avatar, i.kind, i.created_at, i.updated_at";

fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        canonical_id: row.get(1)?,
        canonical_durable: row.get(2)?,
        display_name: row.get(3)?,
        avatar: row.get(4)?,
        kind: parse_column::<IdentityKind>(5, row.get(5)?)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub async fn get_identity(db: &Database, identity_id: &str) -> Result<Option<Identity>, FleetError> {
    let id = identity_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.id = ?1"),
                params![id],
                row_to_identity,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_canonical(
    db: &Database,
    canonical_id: &str,
) -> Result<Option<Identity>, FleetError> {
    let canonical_id = canonical_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM identities i WHERE i.canonical_id = ?1"),
                params![canonical_id],
                row_to_identity,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_connection(
    db: &Database,
    tenant_id: &str,
    external_id: &str,
) -> Result<Option<Identity>, FleetError> {
    let tenant_id = tenant_id.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {IDENTITY_COLUMNS} FROM identities i
                     JOIN connections c ON c.identity_id = i.id
                     WHERE c.observer_tenant_id = ?1 AND c.external_id = ?2"
                ),
                params![tenant_id, external_id],
                row_to_identity,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert by canonical id.
///
/// Lookup order: the canonical id itself, then (for durable ids) a row still
/// keyed by the transient `previous_id`, which is upgraded in place. When
/// both exist the transient row is folded into the durable one and the
/// result reports [`UpsertChange::Upgraded`].
pub async fn upsert_identity(db: &Database, upsert: IdentityUpsert) -> Result<Upserted, FleetError> {
    let fresh_id = new_id();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let kind = upsert.kind.to_string();

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM identities WHERE canonical_id = ?1",
                    params![upsert.canonical_id],
                    |row| row.get(0),
                )
                .optional()?;

            let placeholder: Option<String> = match &upsert.previous_id {
                Some(prev) if upsert.durable && *prev != upsert.canonical_id => tx
                    .query_row(
                        "SELECT id FROM identities WHERE canonical_id = ?1 AND canonical_durable = 0",
                        params![prev],
                        |row| row.get(0),
                    )
                    .optional()?,
                _ => None,
            };

            let result = if let Some(id) = existing {
                let folded = match &placeholder {
                    Some(stale) if *stale != id => {
                        fold_identity(&tx, stale, &id)?;
                        true
                    }
                    _ => false,
                };
                tx.execute(
                    "UPDATE identities SET
                         canonical_durable = MAX(canonical_durable, ?2),
                         display_name = COALESCE(?3, display_name),
                         avatar = COALESCE(?4, avatar),
                         kind = CASE WHEN ?5 = 'bot' THEN 'bot' ELSE kind END,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, upsert.durable, upsert.display_name, upsert.avatar, kind],
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
                    "UPDATE identities SET
                         canonical_id = ?2,
                         canonical_durable = 1,
                         display_name = COALESCE(?3, display_name),
                         avatar = COALESCE(?4, avatar),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![id, upsert.canonical_id, upsert.display_name, upsert.avatar],
                )?;
                Upserted {
                    id,
                    change: UpsertChange::Upgraded,
                }
            } else {
                tx.execute(
                    "INSERT INTO identities (id, canonical_id, canonical_durable, display_name, avatar, kind)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        fresh_id,
                        upsert.canonical_id,
                        upsert.durable,
                        upsert.display_name,
                        upsert.avatar,
                        kind
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

/// Moves every reference to the transient row `stale` onto the durable row
/// `target`, then deletes `stale`.
///
/// Happens when another tenant created the durable row before this one
/// learned that its placeholder is the same person.
fn fold_identity(tx: &rusqlite::Transaction<'_>, stale: &str, target: &str) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE connections SET identity_id = ?2 WHERE identity_id = ?1",
        params![stale, target],
    )?;
    tx.execute(
        "UPDATE OR IGNORE memberships SET identity_id = ?2 WHERE identity_id = ?1",
        params![stale, target],
    )?;
    tx.execute("DELETE FROM memberships WHERE identity_id = ?1", params![stale])?;
    tx.execute(
        "UPDATE messages SET sender_identity_id = ?2 WHERE sender_identity_id = ?1",
        params![stale, target],
    )?;
    tx.execute(
        "UPDATE tenants SET identity_id = ?2 WHERE identity_id = ?1",
        params![stale, target],
    )?;
    tx.execute("DELETE FROM identities WHERE id = ?1", params![stale])?;
    debug!(stale, target, "folded transient identity into durable row");
    Ok(())
}

pub async fn upsert_connection(db: &Database, connection: Connection) -> Result<(), FleetError> {
    let metadata = connection
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(FleetError::storage)?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO connections (observer_tenant_id, external_id, identity_id, kind, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(observer_tenant_id, external_id) DO UPDATE SET
                     identity_id = excluded.identity_id,
                     kind = excluded.kind,
                     metadata = COALESCE(excluded.metadata, connections.metadata),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    connection.observer_tenant_id,
                    connection.external_id,
                    connection.identity_id,
                    connection.kind.to_string(),
                    metadata
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
