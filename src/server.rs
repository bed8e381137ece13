//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::DnsConfig;
use crate::discovery::Discovery;
use crate::error::DnsError;
use crate::handler::ServiceDnsHandler;

/// Builder for [`DnsServer`].
pub struct DnsServerBuilder {
    config: DnsConfig,
    discovery: Option<Arc<dyn Discovery>>,
}

impl DnsServerBuilder {
    /// Set the discovery client used to answer queries.
    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Build the server. Fails when no discovery client was supplied or the
    /// domain is not a valid DNS name.
    pub fn build(self) -> Result<DnsServer, DnsError> {
        let discovery = self
            .discovery
            .ok_or_else(|| DnsError::Config("discovery client is not set".to_string()))?;
        let handler = ServiceDnsHandler::new(&self.config, discovery)?;

        Ok(DnsServer {
            config: self.config,
            handler,
            server: None,
        })
    }
}

/// UDP DNS server answering from the service catalog.
pub struct DnsServer {
    config: DnsConfig,
    handler: ServiceDnsHandler,
    server: Option<ServerFuture<ServiceDnsHandler>>,
}

impl DnsServer {
    /// Start building a server for the given configuration.
    pub fn builder(config: DnsConfig) -> DnsServerBuilder {
        DnsServerBuilder {
            config,
            discovery: None,
        }
    }

    /// Served domain, in FQDN form.
    pub fn domain(&self) -> String {
        self.handler.origin().to_string()
    }

    /// Bind the UDP listener and start serving. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, DnsError> {
        if self.server.is_some() {
            return Err(DnsError::Config("DNS server already started".to_string()));
        }

        info!(
            listen_addr = %self.config.listen_addr(),
            domain = %self.handler.origin(),
            "Starting DNS server"
        );

        let udp_socket = UdpSocket::bind(self.config.listen_addr()).await?;
        let local_addr = udp_socket.local_addr()?;

        let mut server = ServerFuture::new(self.handler.clone());
        server.register_socket(udp_socket);
        self.server = Some(server);

        info!(addr = %local_addr, "DNS UDP listening");
        Ok(local_addr)
    }

    /// Stop accepting packets and release the listener.
    ///
    /// In-flight requests are allowed to finish. Does nothing if the server
    /// is not running.
    pub async fn shutdown(&mut self) -> Result<(), DnsError> {
        let Some(mut server) = self.server.take() else {
            return Ok(());
        };

        info!("Shutting down DNS server");
        match server.shutdown_gracefully().await {
            Ok(()) => {
                info!("DNS server has shutdown");
                Ok(())
            }
            Err(e) => {
                error!("Error shutting down DNS server: {}", e);
                Err(e.into())
            }
        }
    }

    /// Serve until `shutdown` is cancelled, then stop gracefully.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), DnsError> {
        self.start().await?;

        if let Some(server) = self.server.as_mut() {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("DNS server shutdown requested");
                }
                result = server.block_until_done() => {
                    if let Err(e) = result {
                        error!("DNS server error: {}", e);
                    }
                }
            }
        }

        // Failures are already logged by `shutdown`.
        let _ = self.shutdown().await;
        info!("DNS server stopped");
        Ok(())
    }
}
