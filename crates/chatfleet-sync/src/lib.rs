// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk reconciliation of a tenant's contacts and groups.
//!
//! [`SyncService::sync_tenant`] runs the contacts and groups phases
//! concurrently against the tenant's live session. Group profiles are
//! fetched in fixed-size batches; a failed batch is recorded and skipped,
//! and a stopped tenant ends the phase at the next batch boundary.

pub mod recording;
pub mod report;
pub mod scheduler;
pub mod service;

pub use report::{PhaseReport, SyncBatchFailure, SyncReport};
pub use scheduler::spawn_scheduler;
pub use service::SyncService;
