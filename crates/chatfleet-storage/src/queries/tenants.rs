// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant registry rows: lifecycle state, credentials, and profile.

use chatfleet_core::{Credentials, FleetError, TenantProfile, TenantRecord, TenantState};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, parse_column, parse_json};

const TENANT_COLUMNS: &str =
    "id, label, state, credentials, profile, identity_id, last_error, created_at, updated_at";

fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<TenantRecord> {
    Ok(TenantRecord {
        id: row.get(0)?,
        label: row.get(1)?,
        state: parse_column::<TenantState>(2, row.get(2)?)?,
        credentials: row.get::<_, Option<String>>(3)?.map(Credentials::from_raw),
        profile: parse_json::<TenantProfile>(4, row.get(4)?)?,
        identity_id: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn not_found_unless_updated(changed: usize, tenant_id: &str) -> Result<(), FleetError> {
    if changed == 0 {
        Err(FleetError::TenantNotFound(tenant_id.to_string()))
    } else {
        Ok(())
    }
}

/// Create the tenant in `STOPPED` if missing; refresh the label otherwise.
pub async fn upsert_tenant(
    db: &Database,
    tenant_id: &str,
    label: Option<&str>,
) -> Result<TenantRecord, FleetError> {
    let id = tenant_id.to_string();
    let label = label.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenants (id, label) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                     label = COALESCE(excluded.label, tenants.label),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![id, label],
            )?;
            conn.query_row(
                &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"),
                params![id],
                row_to_tenant,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_tenant(db: &Database, tenant_id: &str) -> Result<Option<TenantRecord>, FleetError> {
    let id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"),
                params![id],
                row_to_tenant,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All tenants, or only those with saved credentials.
pub async fn list_tenants(
    db: &Database,
    resumable_only: bool,
) -> Result<Vec<TenantRecord>, FleetError> {
    db.connection()
        .call(move |conn| {
            let filter = if resumable_only {
                "WHERE credentials IS NOT NULL"
            } else {
                ""
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {TENANT_COLUMNS} FROM tenants {filter} ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map([], row_to_tenant)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_tenant_state(
    db: &Database,
    tenant_id: &str,
    state: TenantState,
    last_error: Option<&str>,
) -> Result<(), FleetError> {
    let id = tenant_id.to_string();
    let state = state.to_string();
    let last_error = last_error.map(str::to_string);
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tenants SET state = ?1, last_error = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![state, last_error, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    not_found_unless_updated(changed, tenant_id)
}

pub async fn save_credentials(
    db: &Database,
    tenant_id: &str,
    credentials: &Credentials,
) -> Result<(), FleetError> {
    let id = tenant_id.to_string();
    let raw = credentials.as_str().to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tenants SET credentials = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![raw, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    not_found_unless_updated(changed, tenant_id)
}

pub async fn set_tenant_profile(
    db: &Database,
    tenant_id: &str,
    profile: &TenantProfile,
    identity_id: &str,
) -> Result<(), FleetError> {
    let id = tenant_id.to_string();
    let profile = serde_json::to_string(profile).map_err(FleetError::storage)?;
    let identity_id = identity_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tenants SET profile = ?1, identity_id = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![profile, identity_id, id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    not_found_unless_updated(changed, tenant_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_stopped_tenant_and_keeps_label() {
        let db = Database::open_in_memory().await.unwrap();
        let t = upsert_tenant(&db, "t1", Some("Sales")).await.unwrap();
        assert_eq!(t.state, TenantState::Stopped);
        assert_eq!(t.label.as_deref(), Some("Sales"));

        let t = upsert_tenant(&db, "t1", None).await.unwrap();
        assert_eq!(t.label.as_deref(), Some("Sales"));
        assert_eq!(list_tenants(&db, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn credentials_round_trip_verbatim() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_tenant(&db, "t1", None).await.unwrap();
        assert!(list_tenants(&db, true).await.unwrap().is_empty());

        let raw = r#"{ "imei": "abc",  "cookie": [1, 2] }"#;
        save_credentials(&db, "t1", &Credentials::from_raw(raw))
            .await
            .unwrap();
        let resumable = list_tenants(&db, true).await.unwrap();
        assert_eq!(resumable.len(), 1);
        assert_eq!(resumable[0].credentials.as_ref().unwrap().as_str(), raw);
    }

    #[tokio::test]
    async fn state_update_on_unknown_tenant_fails() {
        let db = Database::open_in_memory().await.unwrap();
        let err = set_tenant_state(&db, "ghost", TenantState::Error, Some("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::TenantNotFound(_)));
    }

    #[tokio::test]
    async fn state_and_error_are_recorded() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_tenant(&db, "t1", None).await.unwrap();
        set_tenant_state(&db, "t1", TenantState::Error, Some("expired"))
            .await
            .unwrap();
        let t = get_tenant(&db, "t1").await.unwrap().unwrap();
        assert_eq!(t.state, TenantState::Error);
        assert_eq!(t.last_error.as_deref(), Some("expired"));
    }
}
