// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event pipeline.
//!
//! A [`Pipeline`] takes raw session events through normalization, identity
//! resolution and idempotent persistence, then publishes one notification
//! per first observation on `tenantId:conversationId`.

pub mod events;
pub mod persist;
pub mod pipeline;
pub mod recording;

pub use events::GroupAction;
pub use persist::{notify, persist_and_notify, to_new_message};
pub use pipeline::{IngestOutcome, Pipeline};
