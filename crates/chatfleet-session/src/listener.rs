// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant protocol event listener.
//!
//! One tokio task per live session consumes the session's broadcast stream
//! in order and hands each event to the [`Pipeline`]. Handler failures are
//! logged and never end the loop.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatfleet_core::{ChatSession, FleetError, RawEvent, RawEventKind};
use chatfleet_ingest::{IngestOutcome, Pipeline};
use chatfleet_resolver::TenantContext;

/// Invoked once when the session's event stream reports a close.
pub type ClosedCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle to a tenant's listener task.
pub struct Listener {
    tenant_id: String,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            cancel: None,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Subscribes to `session` and spawns the consumer task.
    ///
    /// Starting a listener that is already running is a no-op.
    pub fn start(
        &mut self,
        ctx: TenantContext,
        session: Arc<dyn ChatSession>,
        pipeline: Arc<Pipeline>,
        on_closed: ClosedCallback,
    ) {
        if self.is_running() {
            warn!(tenant_id = %self.tenant_id, "listener already running, ignoring start");
            return;
        }

        let mut events = session.subscribe();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            info!(tenant_id = %ctx.tenant_id, "listener started");
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!(tenant_id = %ctx.tenant_id, "listener cancelled");
                        break;
                    }
                    received = events.recv() => match received {
                        Ok(event) if event.kind == RawEventKind::Closed => {
                            warn!(tenant_id = %ctx.tenant_id, "session closed by transport");
                            on_closed();
                            break;
                        }
                        Ok(event) => dispatch(&ctx, session.as_ref(), &pipeline, event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(tenant_id = %ctx.tenant_id, skipped, "listener lagged, events lost");
                        }
                        Err(RecvError::Closed) => {
                            warn!(tenant_id = %ctx.tenant_id, "event stream ended");
                            on_closed();
                            break;
                        }
                    }
                }
            }
            info!(tenant_id = %ctx.tenant_id, "listener stopped");
        });

        self.cancel = Some(cancel);
        self.handle = Some(handle);
    }

    /// Stops the task and waits for it to finish. Safe when never started.
    pub async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(tenant_id = %self.tenant_id, "listener task panicked");
                }
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

async fn dispatch(
    ctx: &TenantContext,
    session: &dyn ChatSession,
    pipeline: &Pipeline,
    event: RawEvent,
) {
    let kind = event.kind;
    let result = match kind {
        RawEventKind::Message => pipeline.ingest_message(ctx, session, &event.payload).await,
        RawEventKind::Undo => pipeline.ingest_recall(ctx, session, &event.payload).await,
        RawEventKind::Reaction => pipeline.ingest_reaction(ctx, session, &event.payload).await,
        RawEventKind::GroupEvent => {
            pipeline
                .ingest_group_event(ctx, session, &event.payload)
                .await
        }
        RawEventKind::Typing | RawEventKind::ReadReceipt => {
            pipeline.forward_ephemeral(ctx, kind, &event.payload).await
        }
        RawEventKind::Error => {
            warn!(tenant_id = %ctx.tenant_id, payload = %event.payload, "transport error reported");
            return;
        }
        RawEventKind::Closed => return,
    };
    log_result(ctx, kind, result);
}

fn log_result(ctx: &TenantContext, kind: RawEventKind, result: Result<IngestOutcome, FleetError>) {
    match result {
        Ok(outcome) => debug!(tenant_id = %ctx.tenant_id, ?kind, ?outcome, "event handled"),
        Err(e) => error!(tenant_id = %ctx.tenant_id, ?kind, error = %e, "event handler failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatfleet_core::{FleetStore, RemoteProfile, TenantProfile};
    use chatfleet_resolver::Resolver;
    use chatfleet_test_utils::TestHarness;
    use serde_json::json;

    use super::*;

    async fn pipeline_for(harness: &TestHarness, tenant_id: &str) -> Arc<Pipeline> {
        harness.store.upsert_tenant(tenant_id, None).await.unwrap();
        let resolver = Arc::new(Resolver::new(harness.store_dyn()));
        resolver
            .register_tenant_profile(
                tenant_id,
                &TenantProfile {
                    remote_id: format!("acc-{tenant_id}"),
                    global_id: Some(format!("G-acc-{tenant_id}")),
                    display_name: None,
                    avatar: None,
                },
            )
            .await
            .unwrap();
        Arc::new(Pipeline::new(resolver, harness.sink_dyn()))
    }

    fn ignore_close() -> ClosedCallback {
        Arc::new(|| {})
    }

    #[tokio::test]
    async fn second_start_keeps_a_single_consumer() {
        let harness = TestHarness::new().await.unwrap();
        let pipeline = pipeline_for(&harness, "t1").await;
        let session = harness.client.session("t1");
        session.add_profile(RemoteProfile {
            user_id: "u-1".into(),
            global_id: Some("G-1".into()),
            display_name: Some("Ana".into()),
            avatar: None,
            is_friend: true,
        });
        let shared: Arc<dyn ChatSession> = session.clone();
        let ctx = TenantContext::new("t1", "acc-t1");

        let mut listener = Listener::new("t1");
        listener.start(ctx.clone(), shared.clone(), pipeline.clone(), ignore_close());
        listener.start(ctx, shared, pipeline, ignore_close());
        assert!(listener.is_running());
        assert_eq!(session.subscriber_count(), 1);

        let delivered = session.emit(
            RawEventKind::Message,
            json!({"msgId": "m-1", "uidFrom": "u-1", "content": "hello", "ts": 1_700_000_000_000i64}),
        );
        assert_eq!(delivered, 1);

        let sink = harness.sink.clone();
        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.events("message").is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("message notification");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.events("message").len(), 1);

        let conversation = harness
            .store
            .find_conversation_by_membership("t1", "u-1")
            .await
            .unwrap()
            .expect("conversation for u-1");
        let messages = harness.store.list_messages(&conversation.id, 10).await.unwrap();
        assert_eq!(messages.len(), 1);

        listener.stop().await;
        assert!(!listener.is_running());
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut listener = Listener::new("t");
        listener.stop().await;
        assert!(!listener.is_running());
        listener.stop().await;
        assert!(!listener.is_running());
    }
}
