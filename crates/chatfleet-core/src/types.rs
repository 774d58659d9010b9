// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session manager, resolver, and storage layers.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Client,
    Storage,
    Notification,
}

/// Lifecycle state of a tenant's session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantState {
    Stopped,
    Starting,
    QrWaiting,
    LoggedIn,
    Error,
}

impl TenantState {
    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Any state may fall into `Error`; `LoggedIn -> Starting` covers reconnects.
    pub fn can_transition_to(self, next: TenantState) -> bool {
        use TenantState::*;
        if next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Error, Starting)
                | (LoggedIn, Starting)
                | (Starting, QrWaiting)
                | (Starting, LoggedIn)
                | (QrWaiting, LoggedIn)
                | (Starting, Stopped)
                | (QrWaiting, Stopped)
                | (LoggedIn, Stopped)
                | (Error, Stopped)
        )
    }

    /// True while a live session handle exists.
    pub fn is_live(self) -> bool {
        self == TenantState::LoggedIn
    }
}

/// Opaque login credentials produced by the chat platform.
///
/// The raw JSON text is stored and replayed verbatim; nothing inspects it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the blob for transmission. Non-JSON blobs are sent as a string.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.0).unwrap_or_else(|_| serde_json::Value::String(self.0.clone()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials([REDACTED; {} bytes])", self.0.len())
    }
}

/// A login challenge forwarded to the operator during interactive login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginChallenge {
    pub tenant_id: String,
    /// The code to render (a QR payload for the default flow).
    pub code: String,
    /// Optional image form of the challenge (base64 PNG) when the platform provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Whether an identity is a third party or one of our own tenant accounts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Customer,
    Bot,
}

/// How an observing tenant relates to an identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Friend,
    Stranger,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Private,
    Group,
}

/// Delivery flag on a stored message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Inbound, observed from a counterpart.
    Received,
    /// Sent by one of our tenants.
    Sent,
}

/// Builds the realtime topic for a tenant's view of a conversation.
pub fn conversation_topic(tenant_id: &str, conversation_id: &str) -> String {
    format!("{tenant_id}:{conversation_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tenant_state_wire_names() {
        assert_eq!(TenantState::QrWaiting.to_string(), "QR_WAITING");
        assert_eq!(TenantState::LoggedIn.to_string(), "LOGGED_IN");
        assert_eq!(
            TenantState::from_str("STOPPED").unwrap(),
            TenantState::Stopped
        );
    }

    #[test]
    fn tenant_state_transitions() {
        use TenantState::*;
        assert!(Stopped.can_transition_to(Starting));
        assert!(Starting.can_transition_to(QrWaiting));
        assert!(QrWaiting.can_transition_to(LoggedIn));
        assert!(LoggedIn.can_transition_to(Stopped));
        assert!(Stopped.can_transition_to(Error));
        assert!(!Stopped.can_transition_to(LoggedIn));
        assert!(!QrWaiting.can_transition_to(Starting));
    }

    #[test]
    fn credentials_are_kept_verbatim() {
        let raw = r#"{"z":1,"a":{"cookie":"x"}}"#;
        let creds = Credentials::from_raw(raw);
        assert_eq!(creds.as_str(), raw);
        assert!(!format!("{creds:?}").contains("cookie"));
    }

    #[test]
    fn topic_format() {
        assert_eq!(conversation_topic("t1", "c9"), "t1:c9");
    }
}
