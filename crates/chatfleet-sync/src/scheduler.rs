// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic sync of every logged-in tenant.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::service::SyncService;

/// Spawns a task that syncs all live tenants every `interval` until
/// `cancel` fires. The first run happens one interval after start.
pub fn spawn_scheduler(
    service: Arc<SyncService>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick.
        ticker.tick().await;
        info!(interval_secs = interval.as_secs(), "sync scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sync scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let reports = service.sync_all_live().await;
                    debug!(tenants = reports.len(), "scheduled sync pass complete");
                }
            }
        }
    })
}
