// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalize, resolve, persist, notify.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use chatfleet_core::{
    ChatSession, FleetError, FleetStore, NotificationSink, PersistOutcome, conversation_topic,
};
use chatfleet_normalizer::{CanonicalMessage, MessageContent, normalize_as};
use chatfleet_resolver::{Resolver, TenantContext};

use crate::persist::{notify, persist_and_notify, to_new_message};
use crate::recording;

/// What the pipeline did with one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The payload could not be routed (no sender or thread).
    Ignored,
    /// The event was valid but could not be attached to a stable identity.
    Dropped { reason: String },
    Persisted {
        conversation_id: String,
        outcome: PersistOutcome,
    },
    Recalled {
        conversation_id: String,
        remote_msg_id: String,
        /// False when the target was unknown or already recalled.
        applied: bool,
    },
    GroupUpdated {
        conversation_id: String,
        action: String,
        members: usize,
    },
    /// An ephemeral event was forwarded to the sink without persistence.
    Forwarded { conversation_id: String },
}

impl IngestOutcome {
    pub(crate) fn dropped(reason: impl Into<String>) -> Self {
        Self::Dropped {
            reason: reason.into(),
        }
    }
}

/// The per-event processing chain shared by every tenant's listener.
pub struct Pipeline {
    pub(crate) store: Arc<dyn FleetStore>,
    pub(crate) resolver: Arc<Resolver>,
    pub(crate) sink: Arc<dyn NotificationSink>,
}

impl Pipeline {
    pub fn new(resolver: Arc<Resolver>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            store: resolver.store().clone(),
            resolver,
            sink,
        }
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// Ingests a message event.
    ///
    /// Resolution failures are logged and reported as [`IngestOutcome::Dropped`];
    /// only storage failures surface as errors.
    pub async fn ingest_message(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        payload: &Value,
    ) -> Result<IngestOutcome, FleetError> {
        self.ingest_typed(ctx, session, payload, None).await
    }

    /// Ingests a recall (undo) event.
    pub async fn ingest_recall(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        payload: &Value,
    ) -> Result<IngestOutcome, FleetError> {
        self.ingest_typed(ctx, session, payload, Some("undo")).await
    }

    /// Ingests a reaction; reactions are stored as messages of type `reaction`.
    pub async fn ingest_reaction(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        payload: &Value,
    ) -> Result<IngestOutcome, FleetError> {
        self.ingest_typed(ctx, session, payload, Some("reaction"))
            .await
    }

    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id))]
    async fn ingest_typed(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        payload: &Value,
        hint: Option<&str>,
    ) -> Result<IngestOutcome, FleetError> {
        let Some(msg) = normalize_as(payload, hint) else {
            recording::record_dropped("unroutable");
            debug!("payload not routable, ignoring");
            return Ok(IngestOutcome::Ignored);
        };

        if let MessageContent::Undo { target_msg_id, .. } = &msg.content {
            return self.apply_recall(ctx, &msg, target_msg_id).await;
        }

        let resolution = match self.resolver.resolve(ctx, session, &msg).await {
            Ok(resolution) => resolution,
            Err(FleetError::Resolution { message }) => {
                recording::record_dropped("resolution");
                warn!(
                    remote_msg_id = %msg.remote_msg_id,
                    sender_id = %msg.sender_id,
                    thread_id = %msg.thread_id,
                    reason = %message,
                    "dropping message"
                );
                return Ok(IngestOutcome::dropped(message));
            }
            Err(e) => return Err(e),
        };

        let new_message = to_new_message(&msg, &resolution, payload)?;
        let outcome = persist_and_notify(
            self.store.as_ref(),
            self.sink.as_ref(),
            &ctx.tenant_id,
            new_message,
            &msg.content.summary(),
        )
        .await?;
        debug!(
            conversation_id = %resolution.conversation.id(),
            remote_msg_id = %msg.remote_msg_id,
            ?outcome,
            "message ingested"
        );
        Ok(IngestOutcome::Persisted {
            conversation_id: resolution.conversation.id().to_string(),
            outcome,
        })
    }

    /// Marks the target recalled. Unknown threads are dropped, never fetched.
    async fn apply_recall(
        &self,
        ctx: &TenantContext,
        msg: &CanonicalMessage,
        target_msg_id: &str,
    ) -> Result<IngestOutcome, FleetError> {
        let Some(conversation) = self
            .resolver
            .lookup_conversation(&ctx.tenant_id, &msg.thread_id)
            .await?
        else {
            recording::record_dropped("unknown_thread");
            debug!(thread_id = %msg.thread_id, "recall for unknown thread");
            return Ok(IngestOutcome::dropped(format!(
                "recall for unknown thread {}",
                msg.thread_id
            )));
        };

        let applied = self
            .store
            .mark_recalled(&conversation.id, target_msg_id)
            .await?;
        if applied {
            notify(
                self.sink.as_ref(),
                &conversation_topic(&ctx.tenant_id, &conversation.id),
                json!({
                    "event": "recall",
                    "tenantId": ctx.tenant_id,
                    "conversationId": conversation.id,
                    "remoteMsgId": target_msg_id,
                }),
            )
            .await;
        }
        Ok(IngestOutcome::Recalled {
            conversation_id: conversation.id,
            remote_msg_id: target_msg_id.to_string(),
            applied,
        })
    }
}
