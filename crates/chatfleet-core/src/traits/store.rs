// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for tenants, identities, conversations, and messages.

use async_trait::async_trait;

use crate::error::FleetError;
use crate::model::{
    Connection, Conversation, ConversationUpsert, Identity, IdentityUpsert, Membership,
    NewMessage, PersistOutcome, StoredMessage, TenantProfile, TenantRecord, Upserted,
};
use crate::traits::adapter::PluginAdapter;
use crate::types::{Credentials, TenantState};

/// Relational store behind the session service.
///
/// Every write is an idempotent upsert keyed by a natural key; a duplicate
/// key turns into a merge or a lookup, never an error.
#[async_trait]
pub trait FleetStore: PluginAdapter {
    // --- tenants ---

    /// Creates the tenant in `STOPPED` if missing; updates the label otherwise.
    async fn upsert_tenant(
        &self,
        tenant_id: &str,
        label: Option<&str>,
    ) -> Result<TenantRecord, FleetError>;

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, FleetError>;

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, FleetError>;

    /// Tenants that have credentials saved and can be resumed.
    async fn list_resumable_tenants(&self) -> Result<Vec<TenantRecord>, FleetError>;

    async fn set_tenant_state(
        &self,
        tenant_id: &str,
        state: TenantState,
        last_error: Option<&str>,
    ) -> Result<(), FleetError>;

    async fn save_credentials(
        &self,
        tenant_id: &str,
        credentials: &Credentials,
    ) -> Result<(), FleetError>;

    async fn set_tenant_profile(
        &self,
        tenant_id: &str,
        profile: &TenantProfile,
        identity_id: &str,
    ) -> Result<(), FleetError>;

    // --- identities ---

    async fn get_identity(&self, identity_id: &str) -> Result<Option<Identity>, FleetError>;

    async fn find_identity_by_canonical(
        &self,
        canonical_id: &str,
    ) -> Result<Option<Identity>, FleetError>;

    /// Fast-path lookup through the tenant's connection edge.
    async fn find_identity_by_connection(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<Option<Identity>, FleetError>;

    async fn upsert_identity(&self, upsert: IdentityUpsert) -> Result<Upserted, FleetError>;

    async fn upsert_connection(&self, connection: Connection) -> Result<(), FleetError>;

    // --- conversations ---

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, FleetError>;

    async fn find_conversation_by_canonical(
        &self,
        canonical_id: &str,
    ) -> Result<Option<Conversation>, FleetError>;

    /// Fast-path lookup through the tenant's own membership.
    async fn find_conversation_by_membership(
        &self,
        tenant_id: &str,
        routing_id: &str,
    ) -> Result<Option<Conversation>, FleetError>;

    async fn upsert_conversation(
        &self,
        upsert: ConversationUpsert,
    ) -> Result<Upserted, FleetError>;

    /// Records a new last-activity timestamp and summary, never moving backwards.
    async fn touch_conversation(
        &self,
        conversation_id: &str,
        sent_at: i64,
        summary: &str,
    ) -> Result<(), FleetError>;

    async fn upsert_membership(&self, membership: Membership) -> Result<(), FleetError>;

    async fn remove_membership(
        &self,
        conversation_id: &str,
        identity_id: &str,
        tenant_id: &str,
    ) -> Result<(), FleetError>;

    async fn list_memberships(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Membership>, FleetError>;

    // --- messages ---

    /// Inserts the message or merges `tenant_id` into its listener set.
    async fn persist_message(
        &self,
        tenant_id: &str,
        message: NewMessage,
    ) -> Result<PersistOutcome, FleetError>;

    async fn get_message(
        &self,
        conversation_id: &str,
        remote_msg_id: &str,
    ) -> Result<Option<StoredMessage>, FleetError>;

    /// Newest first.
    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, FleetError>;

    /// Flags a message as recalled. Returns false when the message is unknown
    /// or was already recalled.
    async fn mark_recalled(
        &self,
        conversation_id: &str,
        remote_msg_id: &str,
    ) -> Result<bool, FleetError>;
}
