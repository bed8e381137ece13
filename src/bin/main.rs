//! registry-dns binary entry point.

use clap::Parser;
use registry_dns::{
    telemetry, Config, Discovery, DiscoveryConfig, DnsServer, InMemoryCatalog, RegistryClient,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// DNS front end for a service-discovery registry.
#[derive(Parser, Debug)]
#[command(name = "registry-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "registry-dns.toml")]
    config: PathBuf,
}

fn build_discovery(config: &DiscoveryConfig) -> Result<Arc<dyn Discovery>, Box<dyn std::error::Error>> {
    match config {
        DiscoveryConfig::Registry(registry) => {
            info!(url = %registry.url, "Using registry discovery backend");
            Ok(Arc::new(RegistryClient::new(registry)?))
        }
        DiscoveryConfig::Static { instances } => {
            let catalog = InMemoryCatalog::with_registrations(instances.iter().cloned());
            info!(instances = catalog.len(), "Using static discovery backend");
            Ok(Arc::new(catalog))
        }
    }
}

/// Cancel `shutdown` once `signal` fires. A failed listener leaves the
/// server running.
async fn cancel_on_signal(
    signal: impl Future<Output = std::io::Result<()>>,
    shutdown: CancellationToken,
) {
    match signal.await {
        Ok(()) => {
            info!("Received shutdown signal");
            shutdown.cancel();
        }
        Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let _telemetry = telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr(),
        domain = %config.dns.domain,
        ttl = config.dns.ttl,
        "Starting registry-dns"
    );

    let discovery = build_discovery(&config.discovery)?;
    let server = DnsServer::builder(config.dns).discovery(discovery).build()?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    if let Err(e) = server.run(shutdown).await {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("registry-dns shutdown complete");
    Ok(())
}
