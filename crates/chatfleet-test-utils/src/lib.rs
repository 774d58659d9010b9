// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for chatfleet integration tests.
//!
//! Stub platform adapters and a harness for fast, deterministic tests
//! without a sidecar or a real chat account.
//!
//! # Components
//!
//! - [`StubClient`] / [`StubSession`] - scripted platform with call counters,
//!   event injection and failure injection
//! - [`RecordingSink`] - notification sink capturing every publish
//! - [`TestHarness`] - temp SQLite store wired with the stubs

pub mod harness;
pub mod recording_sink;
pub mod stub_client;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use recording_sink::RecordingSink;
pub use stub_client::{StubClient, StubSession};
