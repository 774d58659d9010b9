// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`FleetStore`].

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use chatfleet_config::model::StorageConfig;
use chatfleet_core::{
    AdapterType, Connection, Conversation, ConversationUpsert, Credentials, FleetError,
    FleetStore, HealthStatus, Identity, IdentityUpsert, Membership, NewMessage, PersistOutcome,
    PluginAdapter, StoredMessage, TenantProfile, TenantRecord, TenantState, Upserted,
};

use crate::database::{Database, map_tr_err};
use crate::queries;
use crate::queries::stats::RowCounts;

/// SQLite-backed store.
///
/// The database is opened by [`SqliteStore::initialize`]; every query before
/// that fails with a storage error.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already-open database (in-memory tests, tooling).
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Opens the database at the configured path and runs migrations.
    pub async fn initialize(&self) -> Result<(), FleetError> {
        let db =
            Database::open_with_options(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| FleetError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, FleetError> {
        self.db.get().ok_or_else(|| FleetError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Current row counts of the tenant, identity, conversation and message tables.
    pub async fn row_counts(&self) -> Result<RowCounts, FleetError> {
        queries::stats::row_counts(self.db()?).await
    }

    async fn checkpoint(&self) -> Result<(), FleetError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, FleetError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FleetError> {
        self.checkpoint().await
    }
}

#[async_trait]
impl FleetStore for SqliteStore {
    async fn upsert_tenant(
        &self,
        tenant_id: &str,
        label: Option<&str>,
    ) -> Result<TenantRecord, FleetError> {
        queries::tenants::upsert_tenant(self.db()?, tenant_id, label).await
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, FleetError> {
        queries::tenants::get_tenant(self.db()?, tenant_id).await
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, FleetError> {
        queries::tenants::list_tenants(self.db()?, false).await
    }

    async fn list_resumable_tenants(&self) -> Result<Vec<TenantRecord>, FleetError> {
        queries::tenants::list_tenants(self.db()?, true).await
    }

    async fn set_tenant_state(
        &self,
        tenant_id: &str,
        state: TenantState,
        last_error: Option<&str>,
    ) -> Result<(), FleetError> {
        queries::tenants::set_tenant_state(self.db()?, tenant_id, state, last_error).await
    }

    async fn save_credentials(
        &self,
        tenant_id: &str,
        credentials: &Credentials,
    ) -> Result<(), FleetError> {
        queries::tenants::save_credentials(self.db()?, tenant_id, credentials).await
    }

    async fn set_tenant_profile(
        &self,
        tenant_id: &str,
        profile: &TenantProfile,
        identity_id: &str,
    ) -> Result<(), FleetError> {
        queries::tenants::set_tenant_profile(self.db()?, tenant_id, profile, identity_id).await
    }

    async fn get_identity(&self, identity_id: &str) -> Result<Option<Identity>, FleetError> {
        queries::identities::get_identity(self.db()?, identity_id).await
    }

    async fn find_identity_by_canonical(
        &self,
        canonical_id: &str,
    ) -> Result<Option<Identity>, FleetError> {
        queries::identities::find_by_canonical(self.db()?, canonical_id).await
    }

    async fn find_identity_by_connection(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<Option<Identity>, FleetError> {
        queries::identities::find_by_connection(self.db()?, tenant_id, external_id).await
    }

    async fn upsert_identity(&self, upsert: IdentityUpsert) -> Result<Upserted, FleetError> {
        queries::identities::upsert_identity(self.db()?, upsert).await
    }

    async fn upsert_connection(&self, connection: Connection) -> Result<(), FleetError> {
        queries::identities::upsert_connection(self.db()?, connection).await
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, FleetError> {
        queries::conversations::get_conversation(self.db()?, conversation_id).await
    }

    async fn find_conversation_by_canonical(
        &self,
        canonical_id: &str,
    ) -> Result<Option<Conversation>, FleetError> {
        queries::conversations::find_by_canonical(self.db()?, canonical_id).await
    }

    async fn find_conversation_by_membership(
        &self,
        tenant_id: &str,
        routing_id: &str,
    ) -> Result<Option<Conversation>, FleetError> {
        queries::conversations::find_by_membership(self.db()?, tenant_id, routing_id).await
    }

    async fn upsert_conversation(
        &self,
        upsert: ConversationUpsert,
    ) -> Result<Upserted, FleetError> {
        queries::conversations::upsert_conversation(self.db()?, upsert).await
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        sent_at: i64,
        summary: &str,
    ) -> Result<(), FleetError> {
        queries::conversations::touch_conversation(self.db()?, conversation_id, sent_at, summary)
            .await
    }

    async fn upsert_membership(&self, membership: Membership) -> Result<(), FleetError> {
        queries::conversations::upsert_membership(self.db()?, membership).await
    }

    async fn remove_membership(
        &self,
        conversation_id: &str,
        identity_id: &str,
        tenant_id: &str,
    ) -> Result<(), FleetError> {
        queries::conversations::remove_membership(
            self.db()?,
            conversation_id,
            identity_id,
            tenant_id,
        )
        .await
    }

    async fn list_memberships(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Membership>, FleetError> {
        queries::conversations::list_memberships(self.db()?, conversation_id).await
    }

    async fn persist_message(
        &self,
        tenant_id: &str,
        message: NewMessage,
    ) -> Result<PersistOutcome, FleetError> {
        queries::messages::persist_message(self.db()?, tenant_id, message).await
    }

    async fn get_message(
        &self,
        conversation_id: &str,
        remote_msg_id: &str,
    ) -> Result<Option<StoredMessage>, FleetError> {
        queries::messages::get_message(self.db()?, conversation_id, remote_msg_id).await
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, FleetError> {
        queries::messages::list_messages(self.db()?, conversation_id, limit).await
    }

    async fn mark_recalled(
        &self,
        conversation_id: &str,
        remote_msg_id: &str,
    ) -> Result<bool, FleetError> {
        queries::messages::mark_recalled(self.db()?, conversation_id, remote_msg_id).await
    }
}
