//! Command-line interface for the gateway.
//!
//! `serve` runs the HTTP broker. The remaining commands open the data
//! directory directly for inspection, so they cannot run while a server
//! holds the same directory.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::{DeliveryDispatcher, DispatchHandle, HttpDelivery};
use crate::api;
use crate::config::{self, ResolvedConfig};
use crate::core::{CollectionStore, Orchestrator};

/// wah4pc-gateway - patient record request broker
#[derive(Parser, Debug)]
#[command(name = "wah4pc-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Address to bind to (overrides config and WAH4PC_ADDR)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// List registered providers
    Providers,

    /// List pending requests addressed to a provider
    Pending {
        /// Target provider ID
        target_provider_id: String,
    },

    /// Show the status of a request
    Status {
        /// Request ID (REQ-YYYYMMDD-NNNN)
        request_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve { address } => serve(address).await,
            Commands::Providers => list_providers().await,
            Commands::Pending { target_provider_id } => list_pending(&target_provider_id).await,
            Commands::Status { request_id } => show_status(&request_id).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Open the store and wire an orchestrator with HTTP delivery
async fn open_orchestrator(cfg: &ResolvedConfig) -> Result<(Orchestrator, DispatchHandle)> {
    let store = CollectionStore::open(&cfg.data_dir)
        .await
        .with_context(|| format!("Failed to open data directory: {}", cfg.data_dir.display()))?;

    let delivery = Arc::new(HttpDelivery::new(cfg.delivery.timeout()));
    let (dispatcher, handle) = DeliveryDispatcher::spawn(delivery, cfg.delivery.dispatch());

    Ok((Orchestrator::new(Arc::new(store), dispatcher), handle))
}

/// Run the HTTP server until ctrl-c
async fn serve(address: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let address = address.unwrap_or_else(|| cfg.address.clone());

    let (orchestrator, dispatch) = open_orchestrator(cfg).await?;
    let app = api::router(Arc::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(%address, data_dir = %cfg.data_dir.display(), "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Push whatever notifications are still queued
    dispatch.shutdown().await?;
    info!("Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// List registered providers
async fn list_providers() -> Result<()> {
    let (orchestrator, dispatch) = open_orchestrator(config::config()?).await?;
    let providers = orchestrator.list_providers().await?;
    dispatch.shutdown().await?;

    if providers.is_empty() {
        println!("No providers registered");
        return Ok(());
    }

    println!("{:<24} {:<30} {:<10} {:<8}", "PROVIDER ID", "NAME", "TYPE", "PUSH");
    println!("{}", "-".repeat(75));

    for provider in providers {
        let push = if provider.request_callback().is_some() { "yes" } else { "poll" };
        println!(
            "{:<24} {:<30} {:<10} {:<8}",
            provider.provider_id,
            provider.name,
            provider.provider_type.as_str(),
            push
        );
    }

    Ok(())
}

/// List pending requests for a target
async fn list_pending(target_provider_id: &str) -> Result<()> {
    let (orchestrator, dispatch) = open_orchestrator(config::config()?).await?;
    let pending = orchestrator
        .pending_requests_for_target(target_provider_id)
        .await?;
    dispatch.shutdown().await?;

    if pending.count == 0 {
        println!("No pending requests for {}", pending.target_provider_id);
        return Ok(());
    }

    println!("{:<20} {:<24} {:<25}", "REQUEST ID", "REQUESTOR", "CREATED");
    println!("{}", "-".repeat(70));

    for request in &pending.pending_requests {
        println!(
            "{:<20} {:<24} {:<25}",
            request.request_id,
            request.requestor_provider_id,
            request.created_at.to_rfc3339()
        );
    }
    println!("\n{} pending", pending.count);

    Ok(())
}

/// Show the status of a request
async fn show_status(request_id: &str) -> Result<()> {
    let (orchestrator, dispatch) = open_orchestrator(config::config()?).await?;
    let view = orchestrator.get_response(request_id).await?;
    dispatch.shutdown().await?;

    println!("Request ID: {}", view.request_id);
    println!("Requestor: {}", view.requestor_provider_id);
    println!("Target: {}", view.target_provider_id);
    println!("Status: {}", view.status);
    if let Some(completed) = view.completed_at {
        println!("Completed: {}", completed);
    }
    if let Some(error) = &view.error {
        println!("Error: {}", error);
    }
    if let Some(patient) = &view.fhir_patient {
        println!("\nPatient:");
        println!("{}", serde_json::to_string_pretty(patient)?);
    }

    Ok(())
}

/// Print the resolved configuration, read fresh from disk
async fn show_config() -> Result<()> {
    let cfg = config::reload_config()?;

    println!("Gateway Configuration");
    println!("=====================");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Server:");
    println!("  Address:  {}", cfg.address);
    println!();
    println!("Storage:");
    println!("  Data dir: {}", cfg.data_dir.display());
    println!();
    println!("Delivery:");
    println!("  Timeout:        {}s", cfg.delivery.timeout_seconds);
    println!("  Queue capacity: {}", cfg.delivery.queue_capacity);
    println!("  Max in flight:  {}", cfg.delivery.max_in_flight);

    Ok(())
}
