// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A tenant's live session over the shared sidecar connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use chatfleet_core::{
    ChatSession, FleetError, RawEvent, RemoteGroupProfile, RemoteMediaRef, RemoteProfile,
    UploadMeta,
};

use crate::connection::Connection;

pub struct BridgeSession {
    tenant_id: String,
    account_id: String,
    conn: Arc<Connection>,
    events: broadcast::Sender<RawEvent>,
    closed: AtomicBool,
}

impl BridgeSession {
    pub(crate) fn new(tenant_id: &str, account_id: String, conn: Arc<Connection>) -> Self {
        let events = conn.stream(tenant_id);
        Self {
            tenant_id: tenant_id.to_string(),
            account_id,
            conn,
            events,
            closed: AtomicBool::new(false),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    async fn call(&self, method: &str, params: Value) -> Result<Option<Value>, FleetError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FleetError::transport(format!(
                "session for tenant {} is closed",
                self.tenant_id
            )));
        }
        self.conn.request(&self.tenant_id, method, params).await
    }

    /// Calls a method whose result must be present.
    async fn call_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, FleetError> {
        let value = self.call(method, params).await?.ok_or_else(|| FleetError::Remote {
            method: method.to_string(),
            message: "not found".into(),
        })?;
        decode(method, value)
    }

    async fn call_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, FleetError> {
        match self.call(method, params).await? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => decode(method, value).map(Some),
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, FleetError> {
    serde_json::from_value(value).map_err(|e| FleetError::Remote {
        method: method.to_string(),
        message: format!("malformed result: {e}"),
    })
}

#[async_trait]
impl ChatSession for BridgeSession {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn own_profile(&self) -> Result<RemoteProfile, FleetError> {
        self.call_required("own_profile", json!({})).await
    }

    async fn get_profile(&self, remote_id: &str) -> Result<Option<RemoteProfile>, FleetError> {
        self.call_optional("get_profile", json!({ "userId": remote_id }))
            .await
    }

    async fn get_group_profile(
        &self,
        remote_id: &str,
    ) -> Result<Option<RemoteGroupProfile>, FleetError> {
        self.call_optional("get_group_profile", json!({ "groupId": remote_id }))
            .await
    }

    async fn get_group_profiles(
        &self,
        remote_ids: &[String],
    ) -> Result<Vec<RemoteGroupProfile>, FleetError> {
        Ok(self
            .call_optional("get_group_profiles", json!({ "groupIds": remote_ids }))
            .await?
            .unwrap_or_default())
    }

    async fn list_contacts(&self) -> Result<Vec<RemoteProfile>, FleetError> {
        Ok(self
            .call_optional("list_contacts", json!({}))
            .await?
            .unwrap_or_default())
    }

    async fn list_groups(&self) -> Result<Vec<String>, FleetError> {
        Ok(self
            .call_optional("list_groups", json!({}))
            .await?
            .unwrap_or_default())
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        meta: UploadMeta,
    ) -> Result<RemoteMediaRef, FleetError> {
        let mut params = serde_json::to_value(&meta)
            .map_err(|e| FleetError::Internal(format!("encoding upload metadata: {e}")))?;
        if let Value::Object(map) = &mut params {
            map.insert("data".into(), Value::String(STANDARD.encode(&bytes)));
        }
        debug!(tenant_id = %self.tenant_id, kind = %meta.kind, size = bytes.len(), "uploading media");
        self.call_required("upload", params).await
    }

    fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.events.subscribe()
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.conn.is_connected().await {
            return;
        }
        if let Err(e) = self
            .conn
            .request(&self.tenant_id, "logout", json!({}))
            .await
        {
            warn!(tenant_id = %self.tenant_id, error = %e, "bridge logout failed");
        }
    }
}
