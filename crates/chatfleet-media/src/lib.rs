// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media ingestion for chatfleet.
//!
//! A [`MediaRegistry`] maps each [`MediaKind`] to a [`MediaStrategy`].
//! New kinds are added by registering a strategy; the dispatcher never changes.

pub mod descriptor;
pub mod registry;
pub mod store;
pub mod strategy;

pub use descriptor::{MediaDescriptor, MediaInput, MediaKind};
pub use registry::MediaRegistry;
pub use store::TransientStore;
pub use strategy::{DeferredStrategy, EagerUploadStrategy, MediaContext, MediaStrategy};
