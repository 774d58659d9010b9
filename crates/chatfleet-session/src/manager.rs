// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant lifecycle and session registry.
//!
//! The [`TenantManager`] owns one entry per tenant: lifecycle state, the live
//! session handle, the listener task and the cancellation token used to stop
//! in-flight work. Entries live in a `DashMap` and are only touched in short
//! synchronous sections; no entry guard is ever held across an `.await`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatfleet_config::model::SessionConfig;
use chatfleet_core::{
    ChallengeCallback, ChatClient, ChatSession, Credentials, FleetError, FleetStore,
    TenantProfile, TenantRecord, TenantState,
};
use chatfleet_ingest::Pipeline;
use chatfleet_resolver::TenantContext;

use crate::listener::{ClosedCallback, Listener};

struct TenantEntry {
    state: TenantState,
    session: Option<Arc<dyn ChatSession>>,
    listener: Listener,
    cancel: CancellationToken,
    /// Bumped by every login attempt and every stop; stale callbacks compare against it.
    generation: u64,
    last_error: Option<String>,
}

impl TenantEntry {
    fn new(tenant_id: &str, cancel: CancellationToken) -> Self {
        Self {
            state: TenantState::Stopped,
            session: None,
            listener: Listener::new(tenant_id),
            cancel,
            generation: 0,
            last_error: None,
        }
    }

    fn apply(&mut self, tenant_id: &str, next: TenantState) -> Result<(), FleetError> {
        if self.state != next && !self.state.can_transition_to(next) {
            debug!(%tenant_id, from = %self.state, to = %next, "rejected transition");
            return Err(FleetError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Operator-facing view of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantStatus {
    pub tenant_id: String,
    pub state: TenantState,
    pub account_id: Option<String>,
    pub listening: bool,
    pub last_error: Option<String>,
}

/// Outcome of [`TenantManager::restore_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    /// Tenant id and error message.
    pub failed: Vec<(String, String)>,
}

/// Registry of tenant sessions.
///
/// Constructed once and shared as `Arc<TenantManager>`; operations that spawn
/// listeners take `self: &Arc<Self>`.
pub struct TenantManager {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn FleetStore>,
    pipeline: Arc<Pipeline>,
    config: SessionConfig,
    tenants: DashMap<String, TenantEntry>,
    root: CancellationToken,
}

impl TenantManager {
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn FleetStore>,
        pipeline: Arc<Pipeline>,
        config: SessionConfig,
    ) -> Self {
        Self {
            client,
            store,
            pipeline,
            config,
            tenants: DashMap::new(),
            root: CancellationToken::new(),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn store(&self) -> &Arc<dyn FleetStore> {
        &self.store
    }

    /// Creates the tenant row in `Stopped`. Idempotent; the label is
    /// updated when given.
    pub async fn register_tenant(
        &self,
        tenant_id: &str,
        label: Option<&str>,
    ) -> Result<TenantRecord, FleetError> {
        let record = self.store.upsert_tenant(tenant_id, label).await?;
        self.ensure_entry(tenant_id).await?;
        info!(%tenant_id, "tenant registered");
        Ok(self.store.get_tenant(tenant_id).await?.unwrap_or(record))
    }

    /// Runs an interactive (QR) login.
    ///
    /// Every challenge goes to `on_challenge`. Resolves once the platform
    /// confirms; on failure the tenant is left in `Error`.
    pub async fn start_interactive_login(
        self: &Arc<Self>,
        tenant_id: &str,
        on_challenge: ChallengeCallback,
    ) -> Result<(), FleetError> {
        let (generation, cancel) = self.begin_login(tenant_id).await?;
        self.transition(tenant_id, TenantState::QrWaiting, None)
            .await?;
        info!(%tenant_id, "waiting for QR confirmation");

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(tenant_id)),
            result = self.client.start_interactive_login(tenant_id, on_challenge) => result,
        };

        match result {
            Ok((session, credentials)) => {
                if !self.is_current(tenant_id, generation) {
                    session.close().await;
                    return Err(cancelled(tenant_id));
                }
                self.store.save_credentials(tenant_id, &credentials).await?;
                self.establish(tenant_id, session, generation).await
            }
            Err(e) => {
                let err = match e {
                    FleetError::Auth { .. } => e,
                    other => FleetError::Auth {
                        tenant_id: tenant_id.to_string(),
                        message: other.to_string(),
                    },
                };
                self.fail_login(tenant_id, generation, &err).await;
                Err(err)
            }
        }
    }

    /// Logs in with saved or operator-supplied credentials.
    pub async fn login_with_credentials(
        self: &Arc<Self>,
        tenant_id: &str,
        credentials: &Credentials,
    ) -> Result<(), FleetError> {
        let (generation, cancel) = self.begin_login(tenant_id).await?;

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(tenant_id)),
            result = self.client.login(tenant_id, credentials) => result,
        };

        match result {
            Ok(session) => {
                if !self.is_current(tenant_id, generation) {
                    session.close().await;
                    return Err(cancelled(tenant_id));
                }
                self.store.save_credentials(tenant_id, credentials).await?;
                self.establish(tenant_id, session, generation).await
            }
            Err(e) => {
                self.fail_login(tenant_id, generation, &e).await;
                Err(e)
            }
        }
    }

    /// Cancels in-flight work, detaches the listener and drops the session.
    /// Idempotent.
    pub async fn stop(&self, tenant_id: &str) -> Result<(), FleetError> {
        let taken = self.tenants.get_mut(tenant_id).map(|mut entry| {
            entry.cancel.cancel();
            entry.cancel = self.root.child_token();
            entry.generation += 1;
            let listener = std::mem::replace(&mut entry.listener, Listener::new(tenant_id));
            let session = entry.session.take();
            let previous = entry.state;
            entry.state = TenantState::Stopped;
            entry.last_error = None;
            (listener, session, previous)
        });

        let Some((mut listener, session, previous)) = taken else {
            return match self.store.get_tenant(tenant_id).await? {
                Some(_) => Ok(()),
                None => Err(FleetError::TenantNotFound(tenant_id.to_string())),
            };
        };

        listener.stop().await;
        if let Some(session) = session {
            session.close().await;
        }
        if previous != TenantState::Stopped {
            self.store
                .set_tenant_state(tenant_id, TenantState::Stopped, None)
                .await?;
            info!(%tenant_id, from = %previous, "tenant stopped");
        }
        Ok(())
    }

    /// The live session; [`FleetError::NotReady`] unless the tenant is logged in.
    pub fn get_live_session(&self, tenant_id: &str) -> Result<Arc<dyn ChatSession>, FleetError> {
        let entry = self
            .tenants
            .get(tenant_id)
            .ok_or_else(|| FleetError::TenantNotFound(tenant_id.to_string()))?;
        match (&entry.state, &entry.session) {
            (TenantState::LoggedIn, Some(session)) => Ok(session.clone()),
            (state, _) => Err(FleetError::NotReady {
                tenant_id: tenant_id.to_string(),
                state: state.to_string(),
            }),
        }
    }

    /// Loads every tenant and logs in, concurrently, each one that has
    /// stored credentials. A failure only affects its own tenant.
    pub async fn restore_all(self: &Arc<Self>) -> Result<RestoreReport, FleetError> {
        for record in self.store.list_tenants().await? {
            self.ensure_entry(&record.id).await?;
        }

        let attempts = self
            .store
            .list_resumable_tenants()
            .await?
            .into_iter()
            .filter(|record| !self.state(&record.id).is_some_and(TenantState::is_live))
            .filter_map(|record| record.credentials.map(|creds| (record.id, creds)))
            .map(|(tenant_id, credentials)| {
                let manager = Arc::clone(self);
                async move {
                    let result = manager
                        .login_with_credentials(&tenant_id, &credentials)
                        .await;
                    (tenant_id, result)
                }
            });

        let mut report = RestoreReport::default();
        for (tenant_id, result) in futures::future::join_all(attempts).await {
            match result {
                Ok(()) => report.restored.push(tenant_id),
                Err(e) => {
                    warn!(%tenant_id, error = %e, "tenant restore failed");
                    report.failed.push((tenant_id, e.to_string()));
                }
            }
        }
        info!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            "tenant restore complete"
        );
        Ok(report)
    }

    /// Stops every tenant.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.tenants.iter().map(|e| e.key().clone()).collect();
        for tenant_id in ids {
            if let Err(e) = self.stop(&tenant_id).await {
                warn!(%tenant_id, error = %e, "stop during shutdown failed");
            }
        }
        self.root.cancel();
        info!("tenant manager shut down");
    }

    pub fn state(&self, tenant_id: &str) -> Option<TenantState> {
        self.tenants.get(tenant_id).map(|entry| entry.state)
    }

    /// Status of every known tenant, ordered by id.
    pub fn snapshot(&self) -> Vec<TenantStatus> {
        let mut statuses: Vec<TenantStatus> = self
            .tenants
            .iter()
            .map(|entry| TenantStatus {
                tenant_id: entry.key().clone(),
                state: entry.state,
                account_id: entry
                    .session
                    .as_ref()
                    .map(|session| session.account_id().to_string()),
                listening: entry.listener.is_running(),
                last_error: entry.last_error.clone(),
            })
            .collect();
        statuses.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        statuses
    }

    /// Token cancelled when the tenant is stopped; sync checks it between batches.
    pub fn cancellation_token(&self, tenant_id: &str) -> Option<CancellationToken> {
        self.tenants.get(tenant_id).map(|entry| entry.cancel.clone())
    }

    async fn ensure_entry(&self, tenant_id: &str) -> Result<(), FleetError> {
        if self.tenants.contains_key(tenant_id) {
            return Ok(());
        }
        let record = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| FleetError::TenantNotFound(tenant_id.to_string()))?;
        self.tenants
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantEntry::new(tenant_id, self.root.child_token()));
        // A state left over from a previous process has no live session behind it.
        if record.state != TenantState::Stopped {
            self.store
                .set_tenant_state(tenant_id, TenantState::Stopped, None)
                .await?;
        }
        Ok(())
    }

    async fn begin_login(&self, tenant_id: &str) -> Result<(u64, CancellationToken), FleetError> {
        self.ensure_entry(tenant_id).await?;
        let (generation, cancel) = {
            let mut entry = self
                .tenants
                .get_mut(tenant_id)
                .ok_or_else(|| FleetError::TenantNotFound(tenant_id.to_string()))?;
            if matches!(
                entry.state,
                TenantState::Starting | TenantState::QrWaiting | TenantState::LoggedIn
            ) {
                return Err(FleetError::InvalidTransition {
                    from: entry.state.to_string(),
                    to: TenantState::Starting.to_string(),
                });
            }
            entry.apply(tenant_id, TenantState::Starting)?;
            entry.last_error = None;
            entry.generation += 1;
            (entry.generation, entry.cancel.clone())
        };
        self.store
            .set_tenant_state(tenant_id, TenantState::Starting, None)
            .await?;
        info!(%tenant_id, "tenant starting");
        Ok((generation, cancel))
    }

    async fn transition(
        &self,
        tenant_id: &str,
        next: TenantState,
        error: Option<&str>,
    ) -> Result<(), FleetError> {
        {
            let mut entry = self
                .tenants
                .get_mut(tenant_id)
                .ok_or_else(|| FleetError::TenantNotFound(tenant_id.to_string()))?;
            entry.apply(tenant_id, next)?;
            entry.last_error = error.map(str::to_string);
        }
        self.store.set_tenant_state(tenant_id, next, error).await?;
        info!(%tenant_id, state = %next, "tenant state changed");
        Ok(())
    }

    /// Stores the session, moves to `LoggedIn`, attaches the listener and
    /// syncs the tenant's own profile.
    async fn establish(
        self: &Arc<Self>,
        tenant_id: &str,
        session: Arc<dyn ChatSession>,
        generation: u64,
    ) -> Result<(), FleetError> {
        let ctx = TenantContext::new(tenant_id, session.account_id());
        {
            let mut entry = self
                .tenants
                .get_mut(tenant_id)
                .ok_or_else(|| FleetError::TenantNotFound(tenant_id.to_string()))?;
            entry.apply(tenant_id, TenantState::LoggedIn)?;
            entry.last_error = None;
            entry.session = Some(session.clone());
            let on_closed = self.closed_callback(tenant_id, generation);
            entry
                .listener
                .start(ctx, session.clone(), self.pipeline.clone(), on_closed);
        }
        self.store
            .set_tenant_state(tenant_id, TenantState::LoggedIn, None)
            .await?;
        info!(%tenant_id, account_id = %session.account_id(), "tenant logged in");

        self.sync_profile(tenant_id, session.as_ref()).await;
        Ok(())
    }

    /// Fetches the tenant's own profile and stores it as a `bot` identity.
    /// Failures are logged; the session stays up.
    async fn sync_profile(&self, tenant_id: &str, session: &dyn ChatSession) {
        let own = match session.own_profile().await {
            Ok(own) => own,
            Err(e) => {
                warn!(%tenant_id, error = %e, "profile sync failed");
                return;
            }
        };
        let profile = TenantProfile {
            remote_id: own.user_id,
            global_id: own.global_id,
            display_name: own.display_name,
            avatar: own.avatar,
        };
        match self
            .pipeline
            .resolver()
            .register_tenant_profile(tenant_id, &profile)
            .await
        {
            Ok(upserted) => {
                debug!(%tenant_id, identity_id = %upserted.id, "profile synced")
            }
            Err(e) => warn!(%tenant_id, error = %e, "storing tenant profile failed"),
        }
    }

    async fn fail_login(&self, tenant_id: &str, generation: u64, err: &FleetError) {
        if !self.is_current(tenant_id, generation) {
            return;
        }
        warn!(%tenant_id, error = %err, "login failed");
        let message = err.to_string();
        if let Err(e) = self
            .transition(tenant_id, TenantState::Error, Some(&message))
            .await
        {
            warn!(%tenant_id, error = %e, "recording login failure failed");
        }
    }

    fn is_current(&self, tenant_id: &str, generation: u64) -> bool {
        self.tenants
            .get(tenant_id)
            .is_some_and(|entry| entry.generation == generation)
    }

    fn closed_callback(self: &Arc<Self>, tenant_id: &str, generation: u64) -> ClosedCallback {
        let manager = Arc::downgrade(self);
        let tenant_id = tenant_id.to_string();
        Arc::new(move || {
            if let Some(manager) = manager.upgrade() {
                let tenant_id = tenant_id.clone();
                tokio::spawn(async move {
                    manager.handle_closed(&tenant_id, generation).await;
                });
            }
        })
    }

    /// Reacts to a transport close reported by the listener.
    async fn handle_closed(self: Arc<Self>, tenant_id: &str, generation: u64) {
        let (mut listener, session) = {
            let Some(mut entry) = self.tenants.get_mut(tenant_id) else {
                return;
            };
            if entry.generation != generation || entry.state != TenantState::LoggedIn {
                debug!(%tenant_id, "ignoring close for a stale session");
                return;
            }
            let listener = std::mem::replace(&mut entry.listener, Listener::new(tenant_id));
            (listener, entry.session.take())
        };
        listener.stop().await;
        if let Some(session) = session {
            session.close().await;
        }

        if !self.config.reconnect {
            if let Err(e) = self
                .transition(tenant_id, TenantState::Error, Some("transport closed"))
                .await
            {
                warn!(%tenant_id, error = %e, "recording transport close failed");
            }
            return;
        }
        if let Err(e) = self.transition(tenant_id, TenantState::Starting, None).await {
            warn!(%tenant_id, error = %e, "cannot begin reconnect");
            return;
        }
        self.reconnect(tenant_id, generation).await;
    }

    async fn reconnect(self: &Arc<Self>, tenant_id: &str, generation: u64) {
        let Some(cancel) = self.cancellation_token(tenant_id) else {
            return;
        };
        let credentials = match self.store.get_tenant(tenant_id).await {
            Ok(Some(TenantRecord {
                credentials: Some(credentials),
                ..
            })) => credentials,
            Ok(_) => {
                self.fail_reconnect(tenant_id, generation, "no stored credentials")
                    .await;
                return;
            }
            Err(e) => {
                self.fail_reconnect(tenant_id, generation, &e.to_string())
                    .await;
                return;
            }
        };

        let max_attempts = self.config.reconnect_max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let delay = backoff_delay(&self.config, attempt);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%tenant_id, "reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            if !self.is_current(tenant_id, generation) {
                return;
            }

            match self.client.login(tenant_id, &credentials).await {
                Ok(session) => {
                    if !self.is_current(tenant_id, generation) {
                        session.close().await;
                        return;
                    }
                    match self.establish(tenant_id, session, generation).await {
                        Ok(()) => info!(%tenant_id, attempt, "tenant reconnected"),
                        Err(e) => {
                            self.fail_reconnect(tenant_id, generation, &e.to_string())
                                .await
                        }
                    }
                    return;
                }
                Err(e) if e.is_auth() => {
                    self.fail_reconnect(tenant_id, generation, &e.to_string())
                        .await;
                    return;
                }
                Err(e) => {
                    warn!(%tenant_id, attempt, max_attempts, error = %e, "reconnect attempt failed")
                }
            }
        }
        self.fail_reconnect(
            tenant_id,
            generation,
            &format!("reconnect failed after {max_attempts} attempts"),
        )
        .await;
    }

    async fn fail_reconnect(&self, tenant_id: &str, generation: u64, message: &str) {
        if !self.is_current(tenant_id, generation) {
            return;
        }
        warn!(%tenant_id, reason = %message, "reconnect abandoned");
        if let Err(e) = self
            .transition(tenant_id, TenantState::Error, Some(message))
            .await
        {
            warn!(%tenant_id, error = %e, "recording reconnect failure failed");
        }
    }
}

/// Exponential backoff: the base delay doubled per attempt, capped.
pub fn backoff_delay(config: &SessionConfig, attempt: u32) -> Duration {
    let factor = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    let ms = config
        .reconnect_backoff_ms
        .saturating_mul(factor)
        .min(config.reconnect_max_backoff_ms);
    Duration::from_millis(ms)
}

fn cancelled(tenant_id: &str) -> FleetError {
    FleetError::Auth {
        tenant_id: tenant_id.to_string(),
        message: "login cancelled by stop".into(),
    }
}
