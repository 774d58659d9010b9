// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group membership events and ephemeral (typing / read) events.
//!
//! Group event payloads carry an action in `type` (or `action`) and the
//! affected group and members under `data`:
//!
//! ```json
//! {"type": "join", "data": {"groupId": "G1", "updateMembers": [{"id": "U1"}]}}
//! ```

use serde_json::{Value, json};
use tracing::{debug, warn};

use chatfleet_core::{
    ChatSession, FleetError, Membership, RawEventKind, conversation_topic,
};
use chatfleet_normalizer::raw::{bool_field, flatten_envelope, object_field, str_field};
use chatfleet_resolver::TenantContext;

use crate::persist::notify;
use crate::pipeline::{IngestOutcome, Pipeline};
use crate::recording;

/// Coarse classification of a group event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Join,
    Leave,
    /// Name, avatar or settings changed; the group profile is refetched.
    Update,
}

impl GroupAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "join" | "add_member" | "join_accepted" => Self::Join,
            "leave" | "remove_member" | "block_member" | "kick" => Self::Leave,
            _ => Self::Update,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Update => "update",
        }
    }
}

impl Pipeline {
    /// Applies a group event to memberships and conversation metadata.
    pub async fn ingest_group_event(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        payload: &Value,
    ) -> Result<IngestOutcome, FleetError> {
        let action = GroupAction::parse(
            &str_field(payload, &["action", "type"]).unwrap_or_default(),
        );
        let data = object_field(payload, "data").unwrap_or_else(|| payload.clone());
        let Some(group_id) = str_field(&data, &["groupId", "threadId"])
            .or_else(|| str_field(payload, &["groupId", "threadId"]))
        else {
            recording::record_dropped("unroutable");
            return Ok(IngestOutcome::Ignored);
        };
        let members: Vec<String> = data
            .get("updateMembers")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| {
                        str_field(m, &["id", "userId"]).or_else(|| m.as_str().map(str::to_string))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let known = self
            .resolver
            .lookup_conversation(&ctx.tenant_id, &group_id)
            .await?;
        let conversation_id = match (known, action) {
            (Some(conversation), GroupAction::Join | GroupAction::Leave) => conversation.id,
            (None, GroupAction::Leave) => {
                debug!(%group_id, "leave event for unknown group");
                return Ok(IngestOutcome::dropped(format!("unknown group {group_id}")));
            }
            _ => match self.refresh_group(ctx, session, &group_id).await? {
                Some(id) => id,
                None => {
                    recording::record_dropped("resolution");
                    return Ok(IngestOutcome::dropped(format!(
                        "group {group_id} could not be fetched"
                    )));
                }
            },
        };

        let mut applied = Vec::new();
        for member in &members {
            let done = match action {
                GroupAction::Join => {
                    self.add_member(ctx, session, &conversation_id, member)
                        .await?
                }
                GroupAction::Leave => self.remove_member(ctx, &conversation_id, member).await?,
                GroupAction::Update => false,
            };
            if done {
                applied.push(member.clone());
            }
        }

        notify(
            self.sink.as_ref(),
            &conversation_topic(&ctx.tenant_id, &conversation_id),
            json!({
                "event": "group",
                "action": action.as_str(),
                "tenantId": ctx.tenant_id,
                "conversationId": conversation_id,
                "members": applied,
            }),
        )
        .await;
        debug!(%group_id, action = action.as_str(), members = applied.len(), "group event applied");
        Ok(IngestOutcome::GroupUpdated {
            conversation_id,
            action: action.as_str().to_string(),
            members: applied.len(),
        })
    }

    /// Refetches the group profile and upserts the conversation.
    async fn refresh_group(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        group_id: &str,
    ) -> Result<Option<String>, FleetError> {
        let group = match session.get_group_profile(group_id).await {
            Ok(Some(group)) => group,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(%group_id, error = %e, "group profile fetch failed");
                return Ok(None);
            }
        };
        let me = match self.resolver.tenant_identity(ctx, Some(session)).await {
            Ok(me) => me,
            Err(FleetError::Resolution { message }) => {
                warn!(%group_id, reason = %message, "tenant identity unavailable");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let upserted = self.resolver.apply_group(ctx, me.id(), &group).await?;
        Ok(Some(upserted.id))
    }

    async fn add_member(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        conversation_id: &str,
        member: &str,
    ) -> Result<bool, FleetError> {
        if member == ctx.account_id {
            // The tenant's own membership was written by the group refresh.
            return Ok(true);
        }
        let identity = match self.resolver.resolve_identity(ctx, session, member).await {
            Ok((identity, _)) => identity,
            Err(FleetError::Resolution { message }) => {
                warn!(%member, reason = %message, "skipping unresolvable group member");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.store
            .upsert_membership(Membership {
                conversation_id: conversation_id.to_string(),
                identity_id: identity.id().to_string(),
                tenant_id: ctx.tenant_id.clone(),
                routing_id: member.to_string(),
                is_self: false,
            })
            .await?;
        Ok(true)
    }

    async fn remove_member(
        &self,
        ctx: &TenantContext,
        conversation_id: &str,
        member: &str,
    ) -> Result<bool, FleetError> {
        let identity_id = if member == ctx.account_id {
            match self.resolver.tenant_identity(ctx, None).await {
                Ok(me) => Some(me.id().to_string()),
                Err(_) => None,
            }
        } else {
            self.store
                .find_identity_by_connection(&ctx.tenant_id, member)
                .await?
                .map(|identity| identity.id)
        };
        let Some(identity_id) = identity_id else {
            return Ok(false);
        };
        self.store
            .remove_membership(conversation_id, &identity_id, &ctx.tenant_id)
            .await?;
        Ok(true)
    }

    /// Forwards typing indicators and read receipts for known threads.
    ///
    /// Nothing is persisted and nothing is fetched; events for threads the
    /// tenant has no membership in are dropped.
    pub async fn forward_ephemeral(
        &self,
        ctx: &TenantContext,
        kind: RawEventKind,
        payload: &Value,
    ) -> Result<IngestOutcome, FleetError> {
        let event = match kind {
            RawEventKind::Typing => "typing",
            RawEventKind::ReadReceipt => "read",
            _ => return Ok(IngestOutcome::Ignored),
        };
        let Some(flat) = flatten_envelope(payload).map(Value::Object) else {
            return Ok(IngestOutcome::Ignored);
        };
        let sender = str_field(&flat, &["uidFrom", "senderId", "fromId"]);
        let is_group = bool_field(&flat, &["isGroup"]).unwrap_or(false)
            || flat.get("threadType").and_then(Value::as_i64) == Some(1);
        let thread = str_field(&flat, &["threadId"])
            .or_else(|| {
                if is_group {
                    str_field(&flat, &["idTo", "groupId"])
                } else {
                    None
                }
            })
            .or_else(|| sender.clone());
        let Some(thread) = thread else {
            return Ok(IngestOutcome::Ignored);
        };

        let Some(conversation) = self
            .resolver
            .lookup_conversation(&ctx.tenant_id, &thread)
            .await?
        else {
            debug!(%thread, event, "ephemeral event for unknown thread");
            return Ok(IngestOutcome::dropped(format!("unknown thread {thread}")));
        };

        notify(
            self.sink.as_ref(),
            &conversation_topic(&ctx.tenant_id, &conversation.id),
            json!({
                "event": event,
                "tenantId": ctx.tenant_id,
                "conversationId": conversation.id,
                "senderId": sender,
                "msgId": str_field(&flat, &["msgId", "globalMsgId"]),
            }),
        )
        .await;
        Ok(IngestOutcome::Forwarded {
            conversation_id: conversation.id,
        })
    }
}
