// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the chatfleet session service.

use thiserror::Error;

/// The primary error type used across all chatfleet traits and core operations.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Login failed: bad or expired credentials, rejected QR, remote refusal.
    #[error("authentication failed for tenant {tenant_id}: {message}")]
    Auth { tenant_id: String, message: String },

    /// An operation needed a live session but the tenant is not logged in.
    #[error("tenant {tenant_id} is not ready (state: {state})")]
    NotReady { tenant_id: String, state: String },

    /// The tenant id is not registered.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// A lifecycle transition that the state machine does not allow.
    #[error("invalid tenant transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Sender or thread could not be mapped to a stable identity.
    #[error("resolution failed: {message}")]
    Resolution { message: String },

    /// The live connection to the chat platform broke.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// One batch of a bulk group fetch failed.
    #[error("sync batch {batch} failed: {message}")]
    SyncBatch { batch: usize, message: String },

    /// A remote call returned an error that is not an auth failure.
    #[error("remote call {method} failed: {message}")]
    Remote { method: String, message: String },

    /// Media ingestion failed (temp file, decode, upload).
    #[error("media error: {message}")]
    Media {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Shorthand for a resolution failure with a formatted message.
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true for errors raised by a rejected login.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
