// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-side helpers shared by the slow resolution path and bulk sync.
//!
//! Every upsert passes the id the row may currently be stored under as
//! `previous_id`, so a numeric placeholder is upgraded in place once the
//! durable id becomes known.

use chatfleet_core::{
    Connection, ConnectionKind, ConversationKind, ConversationUpsert, FleetError, IdentityKind,
    IdentityUpsert, Membership, RemoteGroupProfile, RemoteProfile, UpsertChange, Upserted,
};

use crate::resolver::{Resolver, TenantContext};

/// Result of applying one contact: its identity and private conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactChange {
    pub identity_id: String,
    pub conversation_id: String,
    pub change: UpsertChange,
}

/// Combines two row outcomes into the one reported for the item.
///
/// An upgrade on either row wins, then a creation, then a refresh.
pub fn merge_changes(a: UpsertChange, b: UpsertChange) -> UpsertChange {
    use UpsertChange::*;
    match (a, b) {
        (Upgraded, _) | (_, Upgraded) => Upgraded,
        (Created, _) | (_, Created) => Created,
        _ => Refreshed,
    }
}

impl Resolver {
    /// Upserts the identity behind `profile` and the tenant's connection to it.
    ///
    /// A profile that lacks its durable id never moves an existing connection
    /// off a durable identity; that identity is refreshed instead.
    pub async fn upsert_profile_identity(
        &self,
        tenant_id: &str,
        profile: &RemoteProfile,
        external_id: &str,
    ) -> Result<Upserted, FleetError> {
        let connected = self
            .store
            .find_identity_by_connection(tenant_id, external_id)
            .await?;
        let (mut canonical_id, mut durable) = profile.canonical_id();
        let previous_id = match connected {
            Some(existing) if !durable && existing.canonical_durable => {
                canonical_id = existing.canonical_id;
                durable = true;
                None
            }
            Some(existing) if durable && !existing.canonical_durable => {
                Some(existing.canonical_id)
            }
            _ if durable => Some(profile.user_id.clone()),
            _ => None,
        };

        let upserted = self
            .store
            .upsert_identity(IdentityUpsert {
                canonical_id,
                durable,
                previous_id,
                display_name: profile.display_name.clone(),
                avatar: profile.avatar.clone(),
                kind: IdentityKind::Customer,
            })
            .await?;

        self.store
            .upsert_connection(Connection {
                observer_tenant_id: tenant_id.to_string(),
                external_id: external_id.to_string(),
                identity_id: upserted.id.clone(),
                kind: if profile.is_friend {
                    ConnectionKind::Friend
                } else {
                    ConnectionKind::Stranger
                },
                metadata: None,
            })
            .await?;
        Ok(upserted)
    }

    /// Upserts the private conversation with `counterpart_id` and both
    /// tenant-scoped memberships.
    ///
    /// The conversation's canonical id is the counterpart identity's.
    pub async fn upsert_private_conversation(
        &self,
        ctx: &TenantContext,
        tenant_identity_id: &str,
        counterpart_id: &str,
        routing_id: &str,
    ) -> Result<Upserted, FleetError> {
        let counterpart = self
            .store
            .get_identity(counterpart_id)
            .await?
            .ok_or_else(|| {
                FleetError::resolution(format!("identity {counterpart_id} vanished"))
            })?;

        let previous_id = match self
            .store
            .find_conversation_by_membership(&ctx.tenant_id, routing_id)
            .await?
        {
            Some(existing) if !existing.canonical_durable => Some(existing.canonical_id),
            Some(_) => None,
            None if counterpart.canonical_durable => Some(routing_id.to_string()),
            None => None,
        };

        let upserted = self
            .store
            .upsert_conversation(ConversationUpsert {
                canonical_id: counterpart.canonical_id.clone(),
                durable: counterpart.canonical_durable,
                previous_id,
                kind: ConversationKind::Private,
                name: counterpart.display_name.clone(),
                avatar: counterpart.avatar.clone(),
            })
            .await?;

        self.store
            .upsert_membership(Membership {
                conversation_id: upserted.id.clone(),
                identity_id: tenant_identity_id.to_string(),
                tenant_id: ctx.tenant_id.clone(),
                routing_id: routing_id.to_string(),
                is_self: true,
            })
            .await?;
        if counterpart.id != tenant_identity_id {
            self.store
                .upsert_membership(Membership {
                    conversation_id: upserted.id.clone(),
                    identity_id: counterpart.id,
                    tenant_id: ctx.tenant_id.clone(),
                    routing_id: routing_id.to_string(),
                    is_self: false,
                })
                .await?;
        }
        Ok(upserted)
    }

    /// Applies a contact from a bulk listing: identity, connection, private
    /// conversation and memberships.
    pub async fn apply_contact(
        &self,
        ctx: &TenantContext,
        tenant_identity_id: &str,
        profile: &RemoteProfile,
    ) -> Result<ContactChange, FleetError> {
        let identity = self
            .upsert_profile_identity(&ctx.tenant_id, profile, &profile.user_id)
            .await?;
        let conversation = self
            .upsert_private_conversation(ctx, tenant_identity_id, &identity.id, &profile.user_id)
            .await?;
        Ok(ContactChange {
            identity_id: identity.id,
            conversation_id: conversation.id,
            change: merge_changes(identity.change, conversation.change),
        })
    }

    /// Applies a group profile: the group conversation and the tenant's own
    /// membership, routed by the group's numeric id.
    pub async fn apply_group(
        &self,
        ctx: &TenantContext,
        tenant_identity_id: &str,
        group: &RemoteGroupProfile,
    ) -> Result<Upserted, FleetError> {
        let (mut canonical_id, mut durable) = group.canonical_id();
        let previous_id = match self
            .store
            .find_conversation_by_membership(&ctx.tenant_id, &group.group_id)
            .await?
        {
            Some(existing) if !durable && existing.canonical_durable => {
                canonical_id = existing.canonical_id;
                durable = true;
                None
            }
            Some(existing) if !existing.canonical_durable => Some(existing.canonical_id),
            Some(_) => None,
            None if durable => Some(group.group_id.clone()),
            None => None,
        };

        let upserted = self
            .store
            .upsert_conversation(ConversationUpsert {
                canonical_id,
                durable,
                previous_id,
                kind: ConversationKind::Group,
                name: group.name.clone(),
                avatar: group.avatar.clone(),
            })
            .await?;

        self.store
            .upsert_membership(Membership {
                conversation_id: upserted.id.clone(),
                identity_id: tenant_identity_id.to_string(),
                tenant_id: ctx.tenant_id.clone(),
                routing_id: group.group_id.clone(),
                is_self: true,
            })
            .await?;
        Ok(upserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_dominates() {
        use UpsertChange::*;
        assert_eq!(merge_changes(Refreshed, Upgraded), Upgraded);
        assert_eq!(merge_changes(Created, Upgraded), Upgraded);
        assert_eq!(merge_changes(Refreshed, Created), Created);
        assert_eq!(merge_changes(Refreshed, Refreshed), Refreshed);
    }
}
