//! Consul self-registration sidecar (v1)
//!
//! Registers one or more services with a local discovery agent once the host
//! application's workers accept connections, keeps each service's TTL check
//! passing, and deregisters everything on SIGTERM/SIGINT.
//!
//! # Architecture Overview
//!
//! ```text
//!   --config file.toml ──┐
//!   --register k=v,... ──┴─▶ config ──▶ ServiceDescriptor ×N ──▶ payload ×N
//!                                                   │
//!                                     stale deregister, spawn
//!                                                   ▼
//!   ┌──────────────────────── registration loop (one per service) ─────────┐
//!   │  WaitReady ──▶ Registering ──▶ Checking ⟲ ttl/3      Backoff (ttl)   │
//!   └──────────────┬───────────────────────────┬───────────────────────────┘
//!                  │ readiness gate             │ PUT register / GET check
//!                  ▼                            ▼
//!          worker TCP probes              discovery agent HTTP API
//!
//!   SIGTERM ──▶ shutdown flag ──▶ loops exit;  GET deregister ×N
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use consul_sidecar::config::kvlist::parse_service_spec;
use consul_sidecar::config::loader::{parse_addr, validate_sections};
use consul_sidecar::config::{load_config, LogFormat, SidecarConfig};
use consul_sidecar::lifecycle::signals::shutdown_signal;
use consul_sidecar::lifecycle::{AlwaysReady, ReadinessGate, Shutdown, Sidecar, TcpProbe, WorkerReadiness};
use consul_sidecar::observability::{logging, metrics};
use consul_sidecar::ReqwestExecutor;

#[derive(Parser)]
#[command(name = "consul-sidecar")]
#[command(about = "Register this host's services with a Consul agent", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service to register, as "name=api,url=http://127.0.0.1:8500,...". Repeatable.
    #[arg(short, long = "register", value_name = "SERVICE")]
    register: Vec<String>,

    /// Worker address probed for readiness. Repeatable.
    #[arg(long = "ready-addr", value_name = "ADDR")]
    ready_addr: Vec<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("consul-sidecar v0.1.0 starting");

    if config.services.is_empty() {
        return Err("no services configured, use --register or a [[service]] table".into());
    }

    if config.observability.metrics_enabled {
        let addr = parse_addr(&config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    tracing::info!(
        services = config.services.len(),
        probe_addresses = config.readiness.probe_addresses.len(),
        "Configuration loaded"
    );

    // Probes run for the life of the process and stop with their own signal.
    let probe_shutdown = Shutdown::new();
    let poll_interval = Duration::from_millis(config.readiness.poll_interval_ms);
    let gate: Arc<dyn ReadinessGate> = if config.readiness.probe_addresses.is_empty() {
        Arc::new(AlwaysReady)
    } else {
        let addresses = config
            .readiness
            .probe_addresses
            .iter()
            .map(|addr| parse_addr(addr))
            .collect::<Result<Vec<_>, _>>()?;
        let readiness = Arc::new(WorkerReadiness::new());
        let probe = TcpProbe::new(addresses, poll_interval, readiness.clone());
        tokio::spawn(probe.run(probe_shutdown.subscribe()));
        readiness
    };

    let executor = Arc::new(ReqwestExecutor::new());
    let mut sidecar = Sidecar::new(config.services, executor, gate).with_poll_interval(poll_interval);

    if let Err(e) = sidecar.on_started().await {
        tracing::error!(error = %e, "Setup failed");
        return Err(e.into());
    }

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    probe_shutdown.trigger();
    sidecar.on_stopping().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Merge the config file with command line services and overrides.
fn build_config(cli: Cli) -> Result<SidecarConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SidecarConfig::default(),
    };

    for spec in &cli.register {
        config.services.push(parse_service_spec(spec)?);
    }
    if !cli.ready_addr.is_empty() {
        config.readiness.probe_addresses = cli.ready_addr;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }
    if let Some(addr) = cli.metrics_address {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = addr;
    }

    validate_sections(&config)?;
    Ok(config)
}
