// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot CLI commands.

use std::sync::Arc;

use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;

use chatfleet::App;
use chatfleet_config::FleetConfig;
use chatfleet_core::{ChallengeCallback, FleetError, FleetStore, LoginChallenge};

use crate::serve::init_tracing;

pub async fn tenant_add(
    config: FleetConfig,
    tenant_id: &str,
    label: Option<&str>,
) -> Result<(), FleetError> {
    let app = App::with_bridge(config).await?;
    let record = app.add_tenant(tenant_id, label).await?;
    println!("tenant {} registered ({})", record.id, record.state);
    Ok(())
}

pub async fn tenant_list(config: FleetConfig, json: bool) -> Result<(), FleetError> {
    let app = App::with_bridge(config).await?;
    let tenants = app.list_tenants().await?;

    if json {
        let rows: Vec<serde_json::Value> = tenants
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "label": t.label,
                    "state": t.state,
                    "hasCredentials": t.credentials.is_some(),
                    "lastError": t.last_error,
                })
            })
            .collect();
        let text = serde_json::to_string_pretty(&rows)
            .map_err(|e| FleetError::Internal(format!("encoding tenant list: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    if tenants.is_empty() {
        println!("no tenants registered");
        return Ok(());
    }
    for t in &tenants {
        println!(
            "{:<24} {:<10} {}{}",
            t.id,
            t.state.to_string(),
            t.label.as_deref().unwrap_or("-"),
            t.last_error
                .as_deref()
                .map(|e| format!("  ({e})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Interactive QR login; the challenge is drawn on stderr.
pub async fn login(config: FleetConfig, tenant_id: &str) -> Result<(), FleetError> {
    init_tracing(&config.service.log_level);
    let app = App::with_bridge(config).await?;

    let on_challenge: ChallengeCallback = Arc::new(|challenge: LoginChallenge| {
        match render_qr(&challenge.code) {
            Some(art) => eprintln!("\nScan with the tenant's phone:\n{art}"),
            None => eprintln!("\nLogin code: {}", challenge.code),
        }
    });
    let result = app.manager.start_interactive_login(tenant_id, on_challenge).await;
    if result.is_ok() {
        let account = app
            .manager
            .get_live_session(tenant_id)
            .map(|session| session.account_id().to_string())
            .unwrap_or_default();
        println!("tenant {tenant_id} logged in as {account}; credentials saved");
    }
    app.shutdown().await;
    result
}

/// Logs the tenant in with its saved credentials and runs one sync.
pub async fn sync(config: FleetConfig, tenant_id: &str) -> Result<(), FleetError> {
    init_tracing(&config.service.log_level);
    chatfleet_sync::recording::register_metrics();
    let app = App::with_bridge(config).await?;

    let credentials = app
        .store
        .get_tenant(tenant_id)
        .await?
        .ok_or_else(|| FleetError::TenantNotFound(tenant_id.to_string()))?
        .credentials
        .ok_or_else(|| FleetError::Auth {
            tenant_id: tenant_id.to_string(),
            message: "no saved credentials; run `chatfleet login` first".into(),
        })?;
    app.manager
        .login_with_credentials(tenant_id, &credentials)
        .await?;

    let result = app.sync.sync_tenant(tenant_id).await;
    app.shutdown().await;
    let report = result?;

    let text = serde_json::to_string_pretty(&report)
        .map_err(|e| FleetError::Internal(format!("encoding sync report: {e}")))?;
    println!("{text}");
    Ok(())
}

pub fn config_check(config: &FleetConfig) -> Result<(), FleetError> {
    let text = render_config(config)?;
    println!("configuration OK\n\n{text}");
    Ok(())
}

/// The effective configuration as TOML.
fn render_config(config: &FleetConfig) -> Result<String, FleetError> {
    toml::to_string_pretty(config).map_err(|e| FleetError::Config(e.to_string()))
}

fn render_qr(code: &str) -> Option<String> {
    let qr = QrCode::new(code.as_bytes()).ok()?;
    Some(
        qr.render::<Dense1x2>()
            .dark_color(Dense1x2::Light)
            .light_color(Dense1x2::Dark)
            .quiet_zone(true)
            .build(),
    )
}
