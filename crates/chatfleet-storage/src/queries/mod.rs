// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Every function takes `&Database` and goes through
//! the single writer.

pub mod conversations;
pub mod identities;
pub mod messages;
pub mod stats;
pub mod tenants;
