// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message normalization.
//!
//! Turns heterogeneous platform payloads into a [`CanonicalMessage`] with a
//! tagged [`MessageContent`] body. Pure functions; malformed input yields
//! `None` or an `unknown` variant, never a panic.

pub mod content;
pub mod normalize;
pub mod raw;
pub mod rich_text;

pub use content::{CanonicalMessage, MessageContent, Quote};
pub use normalize::{normalize, normalize_as};
pub use rich_text::{StyleRange, TextSegment, TextStyle};
