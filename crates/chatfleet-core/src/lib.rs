// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chatfleet session service.
//!
//! Holds the error type, the domain model, and the traits behind which the
//! chat platform client, the relational store, and the realtime sink live.

pub mod error;
pub mod model;
pub mod remote;
pub mod traits;
pub mod types;

pub use error::FleetError;
pub use model::{
    Connection, Conversation, ConversationUpsert, Identity, IdentityUpsert, Membership,
    NewMessage, PersistOutcome, StoredMessage, TenantProfile, TenantRecord, UpsertChange,
    Upserted,
};
pub use remote::{
    RawEvent, RawEventKind, RemoteGroupProfile, RemoteMediaRef, RemoteProfile, UploadMeta,
};
pub use traits::{
    ChallengeCallback, ChatClient, ChatSession, FleetStore, NotificationSink, PluginAdapter,
};
pub use types::{
    AdapterType, ConnectionKind, ConversationKind, Credentials, DeliveryStatus, HealthStatus,
    IdentityKind, LoginChallenge, TenantState, conversation_topic,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_error_displays() {
        let err = FleetError::NotReady {
            tenant_id: "t1".into(),
            state: TenantState::QrWaiting.to_string(),
        };
        assert_eq!(err.to_string(), "tenant t1 is not ready (state: QR_WAITING)");

        let err = FleetError::Auth {
            tenant_id: "t1".into(),
            message: "expired".into(),
        };
        assert!(err.is_auth());

        let err = FleetError::storage(std::io::Error::other("disk"));
        assert!(err.to_string().contains("disk"));
    }

    #[test]
    fn adapter_type_round_trips_through_strum() {
        use std::str::FromStr;
        for variant in [
            AdapterType::Client,
            AdapterType::Storage,
            AdapterType::Notification,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn persist_outcome_accessors() {
        let inserted = PersistOutcome::Inserted {
            message_id: "m1".into(),
        };
        assert!(inserted.is_inserted());
        assert_eq!(inserted.message_id(), "m1");
        let merged = PersistOutcome::Merged {
            message_id: "m1".into(),
        };
        assert!(!merged.is_inserted());
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_client<T: ChatClient>() {}
        fn _assert_session<T: ChatSession>() {}
        fn _assert_store<T: FleetStore>() {}
        fn _assert_sink<T: NotificationSink>() {}
    }
}
