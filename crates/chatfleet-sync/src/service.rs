// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact and group reconciliation against a live session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatfleet_config::model::SyncConfig;
use chatfleet_core::{ChatSession, FleetError, TenantState, UpsertChange};
use chatfleet_resolver::{Resolver, TenantContext};
use chatfleet_session::TenantManager;

use crate::recording;
use crate::report::{PhaseReport, SyncBatchFailure, SyncReport};

const CONTACTS: &str = "contacts";
const GROUPS: &str = "groups";

/// Runs sync for tenants owned by a [`TenantManager`].
pub struct SyncService {
    manager: Arc<TenantManager>,
    resolver: Arc<Resolver>,
    batch_size: usize,
}

impl SyncService {
    pub fn new(manager: Arc<TenantManager>, config: &SyncConfig) -> Self {
        let resolver = manager.pipeline().resolver().clone();
        Self {
            manager,
            resolver,
            batch_size: config.group_batch_size.max(1),
        }
    }

    pub fn manager(&self) -> &Arc<TenantManager> {
        &self.manager
    }

    /// Syncs one tenant. Fails with [`FleetError::NotReady`] unless it is logged in.
    pub async fn sync_tenant(&self, tenant_id: &str) -> Result<SyncReport, FleetError> {
        let session = self.manager.get_live_session(tenant_id)?;
        let cancel = self
            .manager
            .cancellation_token(tenant_id)
            .unwrap_or_default();
        let ctx = TenantContext::new(tenant_id, session.account_id());
        self.sync_session(&ctx, session.as_ref(), &cancel).await
    }

    /// Syncs every logged-in tenant in turn. Per-tenant failures are logged.
    pub async fn sync_all_live(&self) -> Vec<SyncReport> {
        let mut reports = Vec::new();
        for status in self.manager.snapshot() {
            if status.state != TenantState::LoggedIn {
                continue;
            }
            match self.sync_tenant(&status.tenant_id).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(tenant_id = %status.tenant_id, error = %e, "sync failed"),
            }
        }
        reports
    }

    /// Runs both phases against `session`. The phases are independent; a
    /// failure in one never aborts the other.
    pub async fn sync_session(
        &self,
        ctx: &TenantContext,
        session: &dyn ChatSession,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, FleetError> {
        let tenant_identity = self
            .resolver
            .tenant_identity(ctx, Some(session))
            .await?
            .id()
            .to_string();

        info!(tenant_id = %ctx.tenant_id, batch_size = self.batch_size, "sync started");
        let (contacts, groups) = tokio::join!(
            self.sync_contacts(ctx, &tenant_identity, session, cancel),
            self.sync_groups(ctx, &tenant_identity, session, cancel),
        );

        let report = SyncReport {
            tenant_id: ctx.tenant_id.clone(),
            contacts,
            groups,
        };
        info!(
            tenant_id = %ctx.tenant_id,
            contacts_created = report.contacts.created,
            contacts_upgraded = report.contacts.upgraded,
            contacts_refreshed = report.contacts.refreshed,
            groups_created = report.groups.created,
            groups_upgraded = report.groups.upgraded,
            groups_refreshed = report.groups.refreshed,
            failed_batches = report.contacts.failed_batches.len() + report.groups.failed_batches.len(),
            cancelled = report.contacts.cancelled || report.groups.cancelled,
            "sync finished"
        );
        Ok(report)
    }

    async fn sync_contacts(
        &self,
        ctx: &TenantContext,
        tenant_identity: &str,
        session: &dyn ChatSession,
        cancel: &CancellationToken,
    ) -> PhaseReport {
        let mut phase = PhaseReport::default();
        let contacts = match session.list_contacts().await {
            Ok(contacts) => contacts,
            Err(e) => {
                record_failure(&mut phase, CONTACTS, 0, Vec::new(), &e);
                return phase;
            }
        };
        debug!(tenant_id = %ctx.tenant_id, count = contacts.len(), "contacts listed");

        for chunk in contacts.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                phase.cancelled = true;
                break;
            }
            for contact in chunk {
                match self
                    .resolver
                    .apply_contact(ctx, tenant_identity, contact)
                    .await
                {
                    Ok(applied) => record_change(&mut phase, CONTACTS, applied.change),
                    Err(e) => {
                        warn!(
                            tenant_id = %ctx.tenant_id,
                            remote_id = %contact.user_id,
                            error = %e,
                            "contact sync failed"
                        );
                        phase.failed_items += 1;
                        recording::record_item(CONTACTS, "failed");
                    }
                }
            }
        }
        phase
    }

    async fn sync_groups(
        &self,
        ctx: &TenantContext,
        tenant_identity: &str,
        session: &dyn ChatSession,
        cancel: &CancellationToken,
    ) -> PhaseReport {
        let mut phase = PhaseReport::default();
        let group_ids = match session.list_groups().await {
            Ok(ids) => ids,
            Err(e) => {
                record_failure(&mut phase, GROUPS, 0, Vec::new(), &e);
                return phase;
            }
        };
        debug!(tenant_id = %ctx.tenant_id, count = group_ids.len(), "groups listed");

        for (batch, ids) in group_ids.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!(tenant_id = %ctx.tenant_id, batch, "group sync cancelled");
                phase.cancelled = true;
                break;
            }
            let groups = match session.get_group_profiles(ids).await {
                Ok(groups) => groups,
                Err(e) => {
                    record_failure(&mut phase, GROUPS, batch, ids.to_vec(), &e);
                    continue;
                }
            };
            for group in &groups {
                match self.resolver.apply_group(ctx, tenant_identity, group).await {
                    Ok(upserted) => record_change(&mut phase, GROUPS, upserted.change),
                    Err(e) => {
                        warn!(
                            tenant_id = %ctx.tenant_id,
                            remote_id = %group.group_id,
                            error = %e,
                            "group sync failed"
                        );
                        phase.failed_items += 1;
                        recording::record_item(GROUPS, "failed");
                    }
                }
            }
        }
        phase
    }
}

fn record_change(phase: &mut PhaseReport, name: &'static str, change: UpsertChange) {
    phase.record(change);
    let outcome = match change {
        UpsertChange::Created => "created",
        UpsertChange::Upgraded => "upgraded",
        UpsertChange::Refreshed => "refreshed",
    };
    recording::record_item(name, outcome);
}

fn record_failure(
    phase: &mut PhaseReport,
    name: &'static str,
    batch: usize,
    ids: Vec<String>,
    err: &FleetError,
) {
    warn!(phase = name, batch, size = ids.len(), error = %err, "sync batch failed");
    recording::record_batch_failure(name);
    phase.failed_batches.push(SyncBatchFailure {
        batch,
        ids,
        message: err.to_string(),
    });
}
