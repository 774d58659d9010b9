// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime notification sink.

use async_trait::async_trait;

use crate::error::FleetError;

/// Best-effort fan-out of realtime updates.
///
/// Topics have the form `tenantId:conversationId`. Callers log failures and
/// never roll back persisted state because of them.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), FleetError>;
}
