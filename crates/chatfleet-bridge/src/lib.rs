// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sidecar bridge client for chatfleet.
//!
//! The chat platform library runs in a separate sidecar process. This crate
//! speaks its JSON-over-WebSocket protocol (see [`frame`]) and exposes it as
//! the [`chatfleet_core::ChatClient`] / [`chatfleet_core::ChatSession`] pair.

mod connection;
pub mod client;
pub mod frame;
pub mod session;

pub use client::BridgeClient;
pub use session::BridgeSession;
