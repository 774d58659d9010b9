// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat platform client and live-session traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::FleetError;
use crate::remote::{RawEvent, RemoteGroupProfile, RemoteMediaRef, RemoteProfile, UploadMeta};
use crate::traits::adapter::PluginAdapter;
use crate::types::{Credentials, LoginChallenge};

/// Receives login challenges while an interactive login is pending.
pub type ChallengeCallback = Arc<dyn Fn(LoginChallenge) + Send + Sync>;

/// Establishes sessions with the chat platform.
#[async_trait]
pub trait ChatClient: PluginAdapter {
    /// Logs in with previously saved credentials.
    ///
    /// Invalid or expired credentials fail with [`FleetError::Auth`].
    async fn login(
        &self,
        tenant_id: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ChatSession>, FleetError>;

    /// Runs an interactive (QR) login.
    ///
    /// Every challenge is passed to `on_challenge`. Resolves once the remote
    /// side confirms, returning the session and the credentials to persist.
    async fn start_interactive_login(
        &self,
        tenant_id: &str,
        on_challenge: ChallengeCallback,
    ) -> Result<(Arc<dyn ChatSession>, Credentials), FleetError>;
}

/// A live, authenticated session for one tenant.
#[async_trait]
pub trait ChatSession: Send + Sync + 'static {
    /// Remote account id of the logged-in tenant.
    fn account_id(&self) -> &str;

    /// Profile of the logged-in account itself.
    async fn own_profile(&self) -> Result<RemoteProfile, FleetError>;

    /// Fetches a user profile. `Ok(None)` when the platform does not know the id.
    async fn get_profile(&self, remote_id: &str) -> Result<Option<RemoteProfile>, FleetError>;

    async fn get_group_profile(
        &self,
        remote_id: &str,
    ) -> Result<Option<RemoteGroupProfile>, FleetError>;

    /// Fetches one batch of group profiles; unknown ids are omitted.
    async fn get_group_profiles(
        &self,
        remote_ids: &[String],
    ) -> Result<Vec<RemoteGroupProfile>, FleetError>;

    async fn list_contacts(&self) -> Result<Vec<RemoteProfile>, FleetError>;

    /// Ids of every group the account belongs to.
    async fn list_groups(&self) -> Result<Vec<String>, FleetError>;

    async fn upload(&self, bytes: Vec<u8>, meta: UploadMeta)
    -> Result<RemoteMediaRef, FleetError>;

    /// Subscribes to the session's event stream.
    ///
    /// Dropping the receiver detaches the subscription.
    fn subscribe(&self) -> broadcast::Receiver<RawEvent>;

    /// Closes the session. Safe to call more than once.
    async fn close(&self);
}
