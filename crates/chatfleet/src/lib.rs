// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service assembly for the `chatfleet` binary.
//!
//! [`App`] wires storage, the realtime bus, the chat client, the ingest
//! pipeline, the tenant manager, sync and media into one handle. The CLI
//! commands and the end-to-end tests both build on it.

pub mod app;
pub mod shutdown;

pub use app::App;
