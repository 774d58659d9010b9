// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` owns a temp SQLite store, a [`StubClient`], a
//! [`RecordingSink`] and the config those were built from. Higher-level
//! components (manager, pipeline, sync) are assembled by the tests on top.

use std::sync::Arc;

use chatfleet_config::model::{FleetConfig, StorageConfig};
use chatfleet_core::{FleetError, FleetStore, NotificationSink};
use chatfleet_storage::SqliteStore;

use crate::recording_sink::RecordingSink;
use crate::stub_client::StubClient;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: FleetConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = FleetConfig::default();
        // Tests drive reconnects explicitly; keep backoff short.
        config.session.reconnect_backoff_ms = 10;
        config.session.reconnect_max_backoff_ms = 50;
        Self { config }
    }

    pub fn with_group_batch_size(mut self, size: usize) -> Self {
        self.config.sync.group_batch_size = size;
        self
    }

    pub fn with_reconnect(mut self, enabled: bool, max_attempts: u32) -> Self {
        self.config.session.reconnect = enabled;
        self.config.session.reconnect_max_attempts = max_attempts;
        self
    }

    /// Arbitrary config tweaks applied before the stack is built.
    pub fn with_config(mut self, f: impl FnOnce(&mut FleetConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the test harness, creating the temp database.
    pub async fn build(mut self) -> Result<TestHarness, FleetError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| FleetError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        self.config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        self.config.media.temp_dir = Some(
            temp_dir
                .path()
                .join("media")
                .to_string_lossy()
                .to_string(),
        );

        let store = SqliteStore::new(self.config.storage.clone());
        store.initialize().await?;

        Ok(TestHarness {
            store: Arc::new(store),
            client: Arc::new(StubClient::new()),
            sink: Arc::new(RecordingSink::new()),
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired test environment.
pub struct TestHarness {
    pub store: Arc<SqliteStore>,
    pub client: Arc<StubClient>,
    pub sink: Arc<RecordingSink>,
    pub config: FleetConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, FleetError> {
        Self::builder().build().await
    }

    pub fn store_dyn(&self) -> Arc<dyn FleetStore> {
        self.store.clone()
    }

    pub fn sink_dyn(&self) -> Arc<dyn NotificationSink> {
        self.sink.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_with_working_store() {
        let harness = TestHarness::builder()
            .with_group_batch_size(2)
            .build()
            .await
            .unwrap();
        assert_eq!(harness.config.sync.group_batch_size, 2);
        let tenant = harness.store.upsert_tenant("t1", Some("Shop")).await.unwrap();
        assert_eq!(tenant.label.as_deref(), Some("Shop"));
    }
}
