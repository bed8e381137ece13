//! Configuration types for registry-dns.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use crate::discovery::InstanceRegistration;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "REGISTRY_DNS";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Discovery backend configuration.
    pub discovery: DiscoveryConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from a TOML file, with `REGISTRY_DNS__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml: &str) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address the UDP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    /// UDP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Domain served by this server (e.g., "amalgam8" or "svc.example.com").
    pub domain: String,

    /// TTL for synthesized records in seconds. Zero asks resolvers not to cache.
    #[serde(default)]
    pub ttl: u32,

    /// Seed for record shuffling. Unset means a fresh seed per request.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

impl DnsConfig {
    /// Configuration for `domain` on `port`, all other settings at defaults.
    pub fn new(port: u16, domain: impl Into<String>) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port,
            domain: domain.into(),
            ttl: 0,
            shuffle_seed: None,
        }
    }

    /// Socket address of the UDP listener.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Which discovery backend answers lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryConfig {
    /// Remote registry over HTTP.
    Registry(RegistryConfig),

    /// Fixed set of instances held in memory.
    Static {
        /// Instances to register at startup.
        #[serde(default)]
        instances: Vec<InstanceRegistration>,
    },
}

/// Registry client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL (e.g., "http://registry:8080").
    pub url: String,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "registry_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8053
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "registry-dns".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_config_defaults() {
        let config = Config::from_toml(
            r#"
            [dns]
            domain = "amalgam8"

            [discovery]
            kind = "registry"
            url = "http://registry:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.dns.port, 8053);
        assert_eq!(config.dns.ttl, 0);
        assert!(config.dns.shuffle_seed.is_none());
        assert_eq!(config.dns.listen_addr(), "0.0.0.0:8053".parse().unwrap());
        assert_eq!(config.telemetry.log_level, "info");
        match config.discovery {
            DiscoveryConfig::Registry(registry) => {
                assert_eq!(registry.url, "http://registry:8080");
                assert_eq!(registry.timeout_secs, 10);
                assert!(registry.token.is_none());
            }
            other => panic!("expected registry discovery, got {:?}", other),
        }
    }

    #[test]
    fn test_static_instances() {
        let config = Config::from_toml(
            r#"
            [dns]
            port = 5353
            domain = "example.com"
            shuffle_seed = 7

            [discovery]
            kind = "static"

            [[discovery.instances]]
            service_name = "reviews"
            tags = ["v1"]
            endpoint = { type = "http", value = "10.0.0.5:9080" }

            [[discovery.instances]]
            service_name = "ratings"
            endpoint = { type = "tcp", value = "10.0.0.6:9090" }
            "#,
        )
        .unwrap();

        assert_eq!(config.dns.port, 5353);
        assert_eq!(config.dns.shuffle_seed, Some(7));
        match config.discovery {
            DiscoveryConfig::Static { instances } => {
                assert_eq!(instances.len(), 2);
                assert_eq!(instances[0].tags, vec!["v1"]);
                assert_eq!(instances[1].endpoint.endpoint_type, "tcp");
                assert!(instances[1].tags.is_empty());
            }
            other => panic!("expected static discovery, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_domain_is_rejected() {
        let result = Config::from_toml(
            r#"
            [dns]
            port = 5353

            [discovery]
            kind = "static"
            "#,
        );
        assert!(result.is_err());
    }
}
