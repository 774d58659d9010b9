// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and conversation resolution.
//!
//! Maps the remote sender and thread ids of a [`CanonicalMessage`] to stable
//! internal rows. The fast path reads tenant-scoped lookup rows only; the slow
//! path fetches profiles from the live session and upserts by canonical id.
//!
//! [`CanonicalMessage`]: chatfleet_normalizer::CanonicalMessage

pub mod apply;
pub mod resolver;

pub use apply::{ContactChange, merge_changes};
pub use resolver::{Resolution, Resolved, Resolver, TenantContext};
