// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the pluggable collaborators.
//!
//! All adapters extend [`PluginAdapter`] and use `#[async_trait]` for
//! dynamic dispatch compatibility.

pub mod adapter;
pub mod client;
pub mod sink;
pub mod store;

pub use adapter::PluginAdapter;
pub use client::{ChallengeCallback, ChatClient, ChatSession};
pub use sink::NotificationSink;
pub use store::FleetStore;
