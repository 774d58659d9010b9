// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chat platform for deterministic tests.
//!
//! `StubClient` hands out one `StubSession` per tenant. Sessions serve
//! profiles and groups from in-memory maps, count every remote call, and
//! let tests push raw events or make individual methods fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};

use chatfleet_core::{
    AdapterType, ChallengeCallback, ChatClient, ChatSession, Credentials, FleetError,
    HealthStatus, LoginChallenge, PluginAdapter, RawEvent, RawEventKind, RemoteGroupProfile,
    RemoteMediaRef, RemoteProfile, UploadMeta,
};

use crate::recording_sink::lock;

/// A stub live session.
pub struct StubSession {
    account_id: String,
    own: Mutex<RemoteProfile>,
    profiles: Mutex<HashMap<String, RemoteProfile>>,
    groups: Mutex<BTreeMap<String, RemoteGroupProfile>>,
    failing_methods: Mutex<HashSet<String>>,
    failing_groups: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    events: broadcast::Sender<RawEvent>,
    closed: AtomicBool,
}

impl StubSession {
    pub fn new(account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        let (events, _) = broadcast::channel(256);
        Self {
            own: Mutex::new(RemoteProfile {
                user_id: account_id.clone(),
                global_id: Some(format!("g-{account_id}")),
                display_name: Some(format!("Bot {account_id}")),
                avatar: None,
                is_friend: false,
            }),
            account_id,
            profiles: Mutex::new(HashMap::new()),
            groups: Mutex::new(BTreeMap::new()),
            failing_methods: Mutex::new(HashSet::new()),
            failing_groups: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            events,
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_own_profile(&self, profile: RemoteProfile) {
        *lock(&self.own) = profile;
    }

    /// Makes `profile` known under its `user_id`.
    pub fn add_profile(&self, profile: RemoteProfile) {
        lock(&self.profiles).insert(profile.user_id.clone(), profile);
    }

    /// Makes `group` known under its `group_id`; it is also listed by `list_groups`.
    pub fn add_group(&self, group: RemoteGroupProfile) {
        lock(&self.groups).insert(group.group_id.clone(), group);
    }

    /// Every call to `method` fails with [`FleetError::Remote`].
    pub fn fail_method(&self, method: &str) {
        lock(&self.failing_methods).insert(method.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing_methods).clear();
        lock(&self.failing_groups).clear();
    }

    /// Any `get_group_profiles` batch containing `group_id` fails.
    pub fn fail_batches_containing(&self, group_id: &str) {
        lock(&self.failing_groups).insert(group_id.to_string());
    }

    /// Number of calls made to `method` so far.
    pub fn calls(&self, method: &str) -> usize {
        lock(&self.calls).get(method).copied().unwrap_or(0)
    }

    /// Pushes an event to every subscriber; returns how many received it.
    pub fn emit(&self, kind: RawEventKind, payload: serde_json::Value) -> usize {
        self.events.send(RawEvent::new(kind, payload)).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    fn record(&self, method: &str) -> Result<(), FleetError> {
        *lock(&self.calls).entry(method.to_string()).or_insert(0) += 1;
        if lock(&self.failing_methods).contains(method) {
            return Err(FleetError::Remote {
                method: method.to_string(),
                message: "stub failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatSession for StubSession {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn own_profile(&self) -> Result<RemoteProfile, FleetError> {
        self.record("own_profile")?;
        Ok(lock(&self.own).clone())
    }

    async fn get_profile(&self, remote_id: &str) -> Result<Option<RemoteProfile>, FleetError> {
        self.record("get_profile")?;
        Ok(lock(&self.profiles).get(remote_id).cloned())
    }

    async fn get_group_profile(
        &self,
        remote_id: &str,
    ) -> Result<Option<RemoteGroupProfile>, FleetError> {
        self.record("get_group_profile")?;
        Ok(lock(&self.groups).get(remote_id).cloned())
    }

    async fn get_group_profiles(
        &self,
        remote_ids: &[String],
    ) -> Result<Vec<RemoteGroupProfile>, FleetError> {
        self.record("get_group_profiles")?;
        {
            let failing = lock(&self.failing_groups);
            if remote_ids.iter().any(|id| failing.contains(id)) {
                return Err(FleetError::Remote {
                    method: "get_group_profiles".into(),
                    message: "stub batch failure".into(),
                });
            }
        }
        let groups = lock(&self.groups);
        Ok(remote_ids
            .iter()
            .filter_map(|id| groups.get(id).cloned())
            .collect())
    }

    async fn list_contacts(&self) -> Result<Vec<RemoteProfile>, FleetError> {
        self.record("list_contacts")?;
        let mut contacts: Vec<RemoteProfile> = lock(&self.profiles)
            .values()
            .filter(|p| p.is_friend)
            .cloned()
            .collect();
        contacts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(contacts)
    }

    async fn list_groups(&self) -> Result<Vec<String>, FleetError> {
        self.record("list_groups")?;
        Ok(lock(&self.groups).keys().cloned().collect())
    }

    async fn upload(
        &self,
        _bytes: Vec<u8>,
        meta: UploadMeta,
    ) -> Result<RemoteMediaRef, FleetError> {
        self.record("upload")?;
        Ok(RemoteMediaRef {
            url: Some(format!("https://stub.invalid/{}/{}", meta.kind, meta.filename)),
            file_id: Some(uuid::Uuid::new_v4().to_string()),
            thumbnail: None,
            duration_ms: None,
            width: None,
            height: None,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.events.subscribe()
    }

    async fn close(&self) {
        *lock(&self.calls).entry("close".to_string()).or_insert(0) += 1;
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A stub platform client.
///
/// Interactive logins emit one challenge and confirm immediately unless a
/// gate is installed with [`StubClient::hold_interactive_login`].
#[derive(Default)]
pub struct StubClient {
    sessions: Mutex<HashMap<String, Arc<StubSession>>>,
    reject_credentials: AtomicBool,
    rejected_tenants: Mutex<HashSet<String>>,
    interactive_error: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    logins: AtomicUsize,
    interactive_logins: AtomicUsize,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session handed out for `tenant_id`, created on first use.
    pub fn session(&self, tenant_id: &str) -> Arc<StubSession> {
        lock(&self.sessions)
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(StubSession::new(format!("acc-{tenant_id}"))))
            .clone()
    }

    /// Credentials the stub issues for `tenant_id` after an interactive login.
    pub fn credentials_for(tenant_id: &str) -> Credentials {
        Credentials::from_raw(format!(
            r#"{{"tenant":"{tenant_id}","token":"stub-token"}}"#
        ))
    }

    /// Credential logins fail with [`FleetError::Auth`] while set.
    pub fn reject_credentials(&self, reject: bool) {
        self.reject_credentials.store(reject, Ordering::SeqCst);
    }

    /// Credential logins for `tenant_id` only fail with [`FleetError::Auth`].
    pub fn reject_credentials_for(&self, tenant_id: &str) {
        lock(&self.rejected_tenants).insert(tenant_id.to_string());
    }

    /// Interactive logins fail with [`FleetError::Auth`] carrying `message`.
    pub fn fail_interactive_login(&self, message: impl Into<String>) {
        *lock(&self.interactive_error) = Some(message.into());
    }

    /// Interactive logins wait after the challenge until the returned
    /// notifier fires.
    pub fn hold_interactive_login(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.gate) = Some(gate.clone());
        gate
    }

    pub fn login_calls(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn interactive_login_calls(&self) -> usize {
        self.interactive_logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for StubClient {
    fn name(&self) -> &str {
        "stub-client"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Client
    }

    async fn health_check(&self) -> Result<HealthStatus, FleetError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FleetError> {
        Ok(())
    }
}

#[async_trait]
impl ChatClient for StubClient {
    async fn login(
        &self,
        tenant_id: &str,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn ChatSession>, FleetError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.reject_credentials.load(Ordering::SeqCst)
            || lock(&self.rejected_tenants).contains(tenant_id)
        {
            return Err(FleetError::Auth {
                tenant_id: tenant_id.to_string(),
                message: "credentials expired".into(),
            });
        }
        let session = self.session(tenant_id);
        session.reopen();
        Ok(session)
    }

    async fn start_interactive_login(
        &self,
        tenant_id: &str,
        on_challenge: ChallengeCallback,
    ) -> Result<(Arc<dyn ChatSession>, Credentials), FleetError> {
        self.interactive_logins.fetch_add(1, Ordering::SeqCst);
        on_challenge(LoginChallenge {
            tenant_id: tenant_id.to_string(),
            code: format!("stub-qr-{tenant_id}"),
            image: None,
        });

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(message) = lock(&self.interactive_error).clone() {
            return Err(FleetError::Auth {
                tenant_id: tenant_id.to_string(),
                message,
            });
        }
        let session = self.session(tenant_id);
        session.reopen();
        let session: Arc<dyn ChatSession> = session;
        Ok((session, Self::credentials_for(tenant_id)))
    }
}
