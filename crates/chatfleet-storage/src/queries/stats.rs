// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row counts across the fleet tables.

use chatfleet_core::FleetError;

use crate::database::{Database, map_tr_err};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub tenants: i64,
    pub identities: i64,
    pub conversations: i64,
    pub messages: i64,
}

pub async fn row_counts(db: &Database) -> Result<RowCounts, FleetError> {
    db.connection()
        .call(|conn| -> Result<RowCounts, rusqlite::Error> {
            let count = |table: &str| -> rusqlite::Result<i64> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            };
            Ok(RowCounts {
                tenants: count("tenants")?,
                identities: count("identities")?,
                conversations: count("conversations")?,
                messages: count("messages")?,
            })
        })
        .await
        .map_err(map_tr_err)
}
