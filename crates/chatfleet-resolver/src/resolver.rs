// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-driven resolution with a fast local path and a slow remote path.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument};

use chatfleet_core::{
    ChatSession, Conversation, FleetError, FleetStore, IdentityKind, IdentityUpsert, Membership,
    TenantProfile, UpsertChange, Upserted,
};
use chatfleet_normalizer::CanonicalMessage;

/// The tenant a message was observed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    /// Remote account id of the tenant's live session.
    pub account_id: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            account_id: account_id.into(),
        }
    }
}

/// Outcome of resolving one axis: an existing row or a freshly created one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Found(String),
    Created(String),
}

impl Resolved {
    pub fn id(&self) -> &str {
        match self {
            Self::Found(id) | Self::Created(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub(crate) fn from_upsert(upserted: Upserted) -> Self {
        match upserted.change {
            UpsertChange::Created => Self::Created(upserted.id),
            UpsertChange::Upgraded | UpsertChange::Refreshed => Self::Found(upserted.id),
        }
    }
}

/// Sender identity and conversation for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub sender: Resolved,
    pub sender_kind: IdentityKind,
    pub conversation: Resolved,
    /// Whether the tenant account itself sent the message.
    pub self_sent: bool,
}

/// Resolves senders and threads against the store, fetching from the live
/// session only when no tenant-scoped lookup row exists.
pub struct Resolver {
    pub(crate) store: Arc<dyn FleetStore>,
    /// tenant id -> the tenant's own identity id.
    tenant_identities: DashMap<String, String>,
}

impl Resolver {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self {
            store,
            tenant_identities: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn FleetStore> {
        &self.store
    }

    /// Maps sender and thread of `msg` to stable ids.
    ///
    /// Remote fetch failures and unknown ids fail with
    /// [`FleetError::Resolution`]; the caller drops the message.
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, thread_id = %msg.thread_id))]
    pub async fn resolve(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        msg: &CanonicalMessage,
    ) -> Result<Resolution, FleetError> {
        let self_sent =
            msg.is_self || (!msg.sender_id.is_empty() && msg.sender_id == ctx.account_id);

        let (sender, sender_kind) = if self_sent {
            (self.tenant_identity(ctx, Some(session)).await?, IdentityKind::Bot)
        } else {
            self.resolve_identity(ctx, session, &msg.sender_id).await?
        };

        let conversation = match self
            .store
            .find_conversation_by_membership(&ctx.tenant_id, &msg.thread_id)
            .await?
        {
            Some(found) => Resolved::Found(found.id),
            None if msg.is_group => {
                let group = session
                    .get_group_profile(&msg.thread_id)
                    .await
                    .map_err(|e| fetch_failed("group", &msg.thread_id, e))?
                    .ok_or_else(|| not_found("group", &msg.thread_id))?;
                let me = self.tenant_identity(ctx, Some(session)).await?;
                Resolved::from_upsert(self.apply_group(ctx, me.id(), &group).await?)
            }
            None => {
                let counterpart = if !self_sent && msg.thread_id == msg.sender_id {
                    sender.clone()
                } else {
                    self.resolve_identity(ctx, session, &msg.thread_id).await?.0
                };
                let me = self.tenant_identity(ctx, Some(session)).await?;
                Resolved::from_upsert(
                    self.upsert_private_conversation(
                        ctx,
                        me.id(),
                        counterpart.id(),
                        &msg.thread_id,
                    )
                    .await?,
                )
            }
        };

        if msg.is_group && !self_sent {
            self.store
                .upsert_membership(Membership {
                    conversation_id: conversation.id().to_string(),
                    identity_id: sender.id().to_string(),
                    tenant_id: ctx.tenant_id.clone(),
                    routing_id: msg.sender_id.clone(),
                    is_self: false,
                })
                .await?;
        }

        debug!(
            sender = %sender.id(),
            conversation = %conversation.id(),
            created = sender.is_created() || conversation.is_created(),
            "resolved message"
        );
        Ok(Resolution {
            sender,
            sender_kind,
            conversation,
            self_sent,
        })
    }

    /// Resolves a remote user id as seen by the tenant.
    pub async fn resolve_identity(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        remote_id: &str,
    ) -> Result<(Resolved, IdentityKind), FleetError> {
        if remote_id.is_empty() {
            return Err(FleetError::resolution("message has no sender id"));
        }
        if let Some(identity) = self
            .store
            .find_identity_by_connection(&ctx.tenant_id, remote_id)
            .await?
        {
            return Ok((Resolved::Found(identity.id), identity.kind));
        }

        let profile = session
            .get_profile(remote_id)
            .await
            .map_err(|e| fetch_failed("profile", remote_id, e))?
            .ok_or_else(|| not_found("profile", remote_id))?;
        let upserted = self
            .upsert_profile_identity(&ctx.tenant_id, &profile, remote_id)
            .await?;
        let kind = self
            .store
            .get_identity(&upserted.id)
            .await?
            .map(|identity| identity.kind)
            .unwrap_or(IdentityKind::Customer);
        Ok((Resolved::from_upsert(upserted), kind))
    }

    /// Fast-path-only thread lookup, used for ephemeral events.
    pub async fn lookup_conversation(
        &self,
        tenant_id: &str,
        routing_id: &str,
    ) -> Result<Option<Conversation>, FleetError> {
        self.store
            .find_conversation_by_membership(tenant_id, routing_id)
            .await
    }

    /// The tenant's own identity.
    ///
    /// Created from the stored tenant profile when missing. The session is
    /// asked for its own profile only when nothing was ever stored.
    pub async fn tenant_identity(
        &self,
        ctx: &TenantContext,
        session: Option<&dyn ChatSession>,
    ) -> Result<Resolved, FleetError> {
        if let Some(id) = self.cached_tenant_identity(&ctx.tenant_id) {
            return Ok(Resolved::Found(id));
        }

        let tenant = self
            .store
            .get_tenant(&ctx.tenant_id)
            .await?
            .ok_or_else(|| FleetError::TenantNotFound(ctx.tenant_id.clone()))?;
        if let Some(id) = tenant.identity_id {
            self.tenant_identities
                .insert(ctx.tenant_id.clone(), id.clone());
            return Ok(Resolved::Found(id));
        }

        let profile = match (tenant.profile, session) {
            (Some(profile), _) => profile,
            (None, Some(session)) => {
                let own = session
                    .own_profile()
                    .await
                    .map_err(|e| fetch_failed("own profile", &ctx.account_id, e))?;
                TenantProfile {
                    remote_id: own.user_id,
                    global_id: own.global_id,
                    display_name: own.display_name,
                    avatar: own.avatar,
                }
            }
            (None, None) => {
                return Err(FleetError::resolution(format!(
                    "tenant {} has no stored profile",
                    ctx.tenant_id
                )));
            }
        };
        let upserted = self.register_tenant_profile(&ctx.tenant_id, &profile).await?;
        Ok(Resolved::from_upsert(upserted))
    }

    /// Upserts the tenant's own `bot` identity and stores the profile on the tenant row.
    pub async fn register_tenant_profile(
        &self,
        tenant_id: &str,
        profile: &TenantProfile,
    ) -> Result<Upserted, FleetError> {
        let (canonical_id, durable) = match profile.global_id.as_deref().map(str::trim) {
            Some(global) if !global.is_empty() => (global.to_string(), true),
            _ => (profile.remote_id.clone(), false),
        };
        let upserted = self
            .store
            .upsert_identity(IdentityUpsert {
                canonical_id,
                durable,
                previous_id: durable.then(|| profile.remote_id.clone()),
                display_name: profile.display_name.clone(),
                avatar: profile.avatar.clone(),
                kind: IdentityKind::Bot,
            })
            .await?;
        self.store
            .set_tenant_profile(tenant_id, profile, &upserted.id)
            .await?;
        self.tenant_identities
            .insert(tenant_id.to_string(), upserted.id.clone());
        debug!(%tenant_id, identity_id = %upserted.id, change = ?upserted.change, "tenant identity registered");
        Ok(upserted)
    }

    fn cached_tenant_identity(&self, tenant_id: &str) -> Option<String> {
        self.tenant_identities
            .get(tenant_id)
            .map(|entry| entry.value().clone())
    }
}

fn fetch_failed(what: &str, remote_id: &str, err: FleetError) -> FleetError {
    FleetError::resolution(format!("{what} fetch for {remote_id} failed: {err}"))
}

fn not_found(what: &str, remote_id: &str) -> FleetError {
    FleetError::resolution(format!("{what} {remote_id} not found on the platform"))
}
