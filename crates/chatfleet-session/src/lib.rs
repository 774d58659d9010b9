// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant session management for chatfleet.
//!
//! [`TenantManager`] drives each tenant through its login state machine,
//! keeps the live session handle and attaches a [`Listener`] that feeds the
//! session's protocol events into the ingest pipeline.

pub mod listener;
pub mod manager;

pub use listener::{ClosedCallback, Listener};
pub use manager::{RestoreReport, TenantManager, TenantStatus, backoff_delay};
