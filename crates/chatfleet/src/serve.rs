// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatfleet serve` command implementation.
//!
//! Opens storage and the realtime bus, connects the sidecar bridge, restores
//! every tenant with saved credentials and keeps their listeners running
//! until SIGINT/SIGTERM. Scheduled sync runs when `sync.interval_secs` is set.

use std::time::Duration;

use tracing::{debug, info, warn};

use chatfleet::App;
use chatfleet::shutdown;
use chatfleet_config::FleetConfig;
use chatfleet_core::FleetError;

/// Runs the `chatfleet serve` command.
pub async fn run_serve(config: FleetConfig) -> Result<(), FleetError> {
    init_tracing(&config.service.log_level);
    chatfleet_ingest::recording::register_metrics();
    chatfleet_sync::recording::register_metrics();

    info!(name = %config.service.name, bridge = %config.bridge.url, "starting chatfleet serve");

    let app = App::with_bridge(config).await?;
    match app.store.row_counts().await {
        Ok(counts) => info!(
            tenants = counts.tenants,
            identities = counts.identities,
            conversations = counts.conversations,
            messages = counts.messages,
            "storage opened"
        ),
        Err(e) => warn!(error = %e, "row counts unavailable"),
    }
    let cancel = shutdown::install_signal_handler();

    match app.start().await {
        Ok(report) => {
            for (tenant_id, error) in &report.failed {
                warn!(%tenant_id, %error, "tenant not restored");
            }
            info!(
                restored = report.restored.len(),
                failed = report.failed.len(),
                "tenants restored"
            );
        }
        Err(e) => warn!(error = %e, "tenant restore failed, continuing"),
    }

    let scheduler = app.config.sync.interval_secs.map(|secs| {
        chatfleet_sync::spawn_scheduler(
            app.sync.clone(),
            Duration::from_secs(secs.max(1)),
            cancel.child_token(),
        )
    });
    if scheduler.is_none() {
        debug!("scheduled sync disabled");
    }

    // Trace every notification at debug level; downstream consumers subscribe the same way.
    {
        let mut notifications = app.bus.subscribe();
        let bus_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = bus_cancel.cancelled() => break,
                    received = notifications.recv() => match received {
                        Ok(n) => debug!(topic = %n.topic, "notification"),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "notification tracer lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    cancel.cancelled().await;
    info!("shutting down");
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!(error = %e, "sync scheduler ended abnormally");
        }
    }
    shutdown::drain(app.shutdown(), shutdown::DRAIN_TIMEOUT).await;
    info!("chatfleet serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatfleet={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
