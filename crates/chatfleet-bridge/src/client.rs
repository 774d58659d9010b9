// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ChatClient`] backed by the sidecar bridge.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use chatfleet_config::model::BridgeConfig;
use chatfleet_core::{
    AdapterType, ChallengeCallback, ChatClient, ChatSession, Credentials, FleetError,
    HealthStatus, PluginAdapter,
};

use crate::connection::Connection;
use crate::session::BridgeSession;

/// Chat platform client talking to the sidecar over one shared WebSocket.
pub struct BridgeClient {
    conn: Arc<Connection>,
}

impl BridgeClient {
    /// Creates the client. The socket is opened on the first request.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    fn session(&self, tenant_id: &str, result: &Value) -> Result<BridgeSession, FleetError> {
        let account_id = result
            .get("accountId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FleetError::Auth {
                tenant_id: tenant_id.to_string(),
                message: "login result has no accountId".into(),
            })?;
        Ok(BridgeSession::new(
            tenant_id,
            account_id.to_string(),
            Arc::clone(&self.conn),
        ))
    }
}

fn unknown_account(tenant_id: &str) -> FleetError {
    FleetError::Auth {
        tenant_id: tenant_id.to_string(),
        message: "account not found".into(),
    }
}

#[async_trait]
impl PluginAdapter for BridgeClient {
    fn name(&self) -> &str {
        "bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Client
    }

    async fn health_check(&self) -> Result<HealthStatus, FleetError> {
        if self.conn.is_connected().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(format!(
                "not connected to {}",
                self.conn.url()
            )))
        }
    }

    async fn shutdown(&self) -> Result<(), FleetError> {
        Ok(())
    }
}

#[async_trait]
impl ChatClient for BridgeClient {
    async fn login(
        &self,
        tenant_id: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ChatSession>, FleetError> {
        let result = self
            .conn
            .request(
                tenant_id,
                "login",
                json!({ "credentials": credentials.to_json() }),
            )
            .await?
            .ok_or_else(|| unknown_account(tenant_id))?;
        let session = self.session(tenant_id, &result)?;
        info!(%tenant_id, account_id = %session.account_id(), "bridge login succeeded");
        Ok(Arc::new(session))
    }

    async fn start_interactive_login(
        &self,
        tenant_id: &str,
        on_challenge: ChallengeCallback,
    ) -> Result<(Arc<dyn ChatSession>, Credentials), FleetError> {
        self.conn.set_challenge_callback(tenant_id, on_challenge);
        // The sidecar answers only once the QR is confirmed or rejected.
        let result = self
            .conn
            .request_with(tenant_id, "qr_login", json!({}), None)
            .await;
        self.conn.clear_challenge_callback(tenant_id);

        let result = result?.ok_or_else(|| unknown_account(tenant_id))?;
        let credentials = match result.get("credentials") {
            Some(Value::Null) | None => {
                return Err(FleetError::Auth {
                    tenant_id: tenant_id.to_string(),
                    message: "login result has no credentials".into(),
                });
            }
            Some(Value::String(raw)) => Credentials::from_raw(raw.clone()),
            Some(other) => Credentials::from_json(other),
        };
        let session = self.session(tenant_id, &result)?;
        info!(%tenant_id, account_id = %session.account_id(), "bridge QR login confirmed");
        Ok((Arc::new(session), credentials))
    }
}
