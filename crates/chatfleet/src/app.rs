// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The assembled service.

use std::sync::Arc;

use tracing::info;

use chatfleet_bridge::BridgeClient;
use chatfleet_bus::EventBus;
use chatfleet_config::FleetConfig;
use chatfleet_core::{ChatClient, FleetError, FleetStore, NotificationSink, TenantRecord};
use chatfleet_ingest::Pipeline;
use chatfleet_media::{MediaDescriptor, MediaInput, MediaKind, MediaRegistry, TransientStore};
use chatfleet_resolver::Resolver;
use chatfleet_session::{RestoreReport, TenantManager};
use chatfleet_storage::SqliteStore;
use chatfleet_sync::SyncService;

pub struct App {
    pub config: FleetConfig,
    pub store: Arc<SqliteStore>,
    pub bus: Arc<EventBus>,
    pub manager: Arc<TenantManager>,
    pub sync: Arc<SyncService>,
    pub media: MediaRegistry,
}

impl App {
    /// Opens the store and wires every component around `client`.
    pub async fn build(config: FleetConfig, client: Arc<dyn ChatClient>) -> Result<Self, FleetError> {
        let store = SqliteStore::new(config.storage.clone());
        store.initialize().await?;
        let store = Arc::new(store);
        let store_dyn: Arc<dyn FleetStore> = store.clone();

        let bus = Arc::new(EventBus::new(config.notify.capacity));
        let sink: Arc<dyn NotificationSink> = bus.clone();

        let resolver = Arc::new(Resolver::new(store_dyn.clone()));
        let pipeline = Arc::new(Pipeline::new(resolver, sink));
        let manager = Arc::new(TenantManager::new(
            client,
            store_dyn,
            pipeline,
            config.session.clone(),
        ));
        let sync = Arc::new(SyncService::new(manager.clone(), &config.sync));
        let media = MediaRegistry::with_defaults(TransientStore::from_config(&config.media));

        info!(
            database = %config.storage.database_path,
            media_dir = %media.store().dir().display(),
            "service assembled"
        );
        Ok(Self {
            config,
            store,
            bus,
            manager,
            sync,
            media,
        })
    }

    /// Builds the service against the sidecar bridge named in the config.
    pub async fn with_bridge(config: FleetConfig) -> Result<Self, FleetError> {
        let client: Arc<dyn ChatClient> = Arc::new(BridgeClient::new(&config.bridge));
        Self::build(config, client).await
    }

    pub async fn add_tenant(
        &self,
        tenant_id: &str,
        label: Option<&str>,
    ) -> Result<TenantRecord, FleetError> {
        self.manager.register_tenant(tenant_id, label).await
    }

    pub async fn list_tenants(&self) -> Result<Vec<TenantRecord>, FleetError> {
        self.store.list_tenants().await
    }

    /// Resumes saved tenants when `session.restore_on_start` is set.
    pub async fn start(&self) -> Result<RestoreReport, FleetError> {
        if !self.config.session.restore_on_start {
            info!("tenant restore disabled by configuration");
            return Ok(RestoreReport::default());
        }
        self.manager.restore_all().await
    }

    /// Prepares an outbound attachment for `tenant_id`.
    ///
    /// Eager kinds upload through the tenant's live session and fail when it
    /// is not logged in; deferred kinds only stage the bytes locally.
    pub async fn ingest_media(
        &self,
        tenant_id: &str,
        kind: MediaKind,
        input: MediaInput,
    ) -> Result<MediaDescriptor, FleetError> {
        let session = self.manager.get_live_session(tenant_id).ok();
        self.media
            .ingest(kind, input, session.as_deref())
            .await
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}
