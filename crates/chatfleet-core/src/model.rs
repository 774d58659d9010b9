// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent domain records and the write requests that produce them.

use serde::{Deserialize, Serialize};

use crate::types::{
    ConnectionKind, ConversationKind, Credentials, DeliveryStatus, IdentityKind, TenantState,
};

/// One operator-owned bot account.
#[derive(Debug, Clone)]
pub struct TenantRecord {
    pub id: String,
    pub label: Option<String>,
    pub state: TenantState,
    pub credentials: Option<Credentials>,
    pub profile: Option<TenantProfile>,
    /// The tenant's own [`Identity`], filled by profile sync.
    pub identity_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The tenant account's own profile as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub remote_id: String,
    #[serde(default)]
    pub global_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A person or account independent of which tenant observes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub canonical_id: String,
    /// False while the canonical id is a transient numeric placeholder.
    pub canonical_durable: bool,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub kind: IdentityKind,
    pub created_at: String,
    pub updated_at: String,
}

/// Write request for an identity keyed by canonical remote id.
#[derive(Debug, Clone)]
pub struct IdentityUpsert {
    pub canonical_id: String,
    pub durable: bool,
    /// A transient id the row may currently be stored under; used for in-place upgrade.
    pub previous_id: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub kind: IdentityKind,
}

/// Tenant-scoped edge from an observing tenant to an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub observer_tenant_id: String,
    pub external_id: String,
    pub identity_id: String,
    pub kind: ConnectionKind,
    pub metadata: Option<serde_json::Value>,
}

/// A chat thread, one row per canonical thread identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub canonical_id: String,
    pub canonical_durable: bool,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    /// Epoch milliseconds of the newest message.
    pub last_activity_at: Option<i64>,
    pub last_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Write request for a conversation keyed by canonical remote id.
#[derive(Debug, Clone)]
pub struct ConversationUpsert {
    pub canonical_id: String,
    pub durable: bool,
    pub previous_id: Option<String>,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// What an upsert did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertChange {
    Created,
    /// A transient canonical id was replaced by a durable one on the same row.
    Upgraded,
    Refreshed,
}

/// Result of an identity or conversation upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub id: String,
    pub change: UpsertChange,
}

/// Links a conversation to an identity as seen by one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub conversation_id: String,
    pub identity_id: String,
    pub tenant_id: String,
    /// The id the tenant uses to address the thread (or participant) remotely.
    pub routing_id: String,
    /// True for the tenant's own membership, the fast-path lookup row.
    pub is_self: bool,
}

/// A canonical message ready to be written.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub remote_msg_id: String,
    pub client_msg_id: Option<String>,
    pub sender_identity_id: String,
    pub sender_kind: IdentityKind,
    /// Tagged canonical content (`{"type": "text", ...}`).
    pub content: serde_json::Value,
    pub content_type: String,
    /// Raw protocol payload kept for debugging.
    pub raw: Option<serde_json::Value>,
    pub sent_at: i64,
    pub delivery: DeliveryStatus,
    pub quote_remote_id: Option<String>,
}

/// A persisted message with its listener set.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub remote_msg_id: String,
    pub client_msg_id: Option<String>,
    pub sender_identity_id: String,
    pub sender_kind: IdentityKind,
    pub content: serde_json::Value,
    pub content_type: String,
    pub sent_at: i64,
    pub listening_tenants: Vec<String>,
    pub recalled: bool,
    pub delivery: DeliveryStatus,
    pub quote_remote_id: Option<String>,
    pub created_at: String,
}

/// Result of an idempotent message write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// First observation; the message row was created.
    Inserted { message_id: String },
    /// Existing row; the tenant was added to its listener set.
    Merged { message_id: String },
    /// Existing row already listing this tenant.
    AlreadyObserved { message_id: String },
}

impl PersistOutcome {
    pub fn message_id(&self) -> &str {
        match self {
            Self::Inserted { message_id }
            | Self::Merged { message_id }
            | Self::AlreadyObserved { message_id } => message_id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}
