// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatfleet - multi-tenant chat bot session service.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chatfleet - multi-tenant chat bot session service.
#[derive(Parser, Debug)]
#[command(name = "chatfleet", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the session service.
    Serve,
    /// Manage tenants.
    Tenant {
        #[command(subcommand)]
        action: TenantCommands,
    },
    /// Log a tenant in by scanning a QR code.
    Login { tenant: String },
    /// Reconcile a tenant's contacts and groups.
    Sync { tenant: String },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Register a tenant.
    Add {
        id: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// List tenants and their states.
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate the configuration and print the effective values.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => chatfleet_config::load_and_validate_path(path),
        None => chatfleet_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            chatfleet_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Tenant {
            action: TenantCommands::Add { id, label },
        }) => commands::tenant_add(config, &id, label.as_deref()).await,
        Some(Commands::Tenant {
            action: TenantCommands::List { json },
        }) => commands::tenant_list(config, json).await,
        Some(Commands::Login { tenant }) => commands::login(config, &tenant).await,
        Some(Commands::Sync { tenant }) => commands::sync(config, &tenant).await,
        Some(Commands::Config {
            action: ConfigCommands::Check,
        }) => commands::config_check(&config),
        None => {
            println!("chatfleet: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
