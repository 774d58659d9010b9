// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the chatfleet session service.
//!
//! WAL-mode SQLite with embedded refinery migrations, a single writer via
//! `tokio-rusqlite`, and idempotent upserts for tenants, identities,
//! conversations, memberships, and messages.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
pub use queries::stats::RowCounts;
