//! Registry DNS - A DNS front end for a service-discovery catalog.
//!
//! This crate answers A, AAAA and SRV questions for a single domain by looking
//! up registered service instances and synthesizing records from their
//! endpoints. Names are parsed into either a service lookup (optionally
//! narrowed by tags and a protocol) or a lookup of one instance by ID.
//!
//! ## Features
//!
//! - Service lookups filtered by tags and endpoint protocol
//! - Instance lookups by ID, used as SRV targets
//! - SRV answers with address records in the additional section
//! - Shuffled answers, with an optional fixed seed
//! - Pluggable discovery backend (HTTP registry or in-memory catalog)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         registry-dns                            │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │ Discovery client │◀───│ Catalog gateway  │                  │
//! │  │ (registry/memory)│    │                  │                  │
//! │  └──────────────────┘    └────────▲─────────┘                  │
//! │                                   │ lookup key                  │
//! │  ┌──────────────────┐    ┌────────┴─────────┐                  │
//! │  │ Record           │◀───│  Hickory DNS     │◀── UDP           │
//! │  │ synthesizer      │    │  handler         │                  │
//! │  └──────────────────┘    └──────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! v1.reviews.service.example.com        A
//!   → instances of "reviews" tagged "v1"
//!   → A record per instance with an IPv4 endpoint
//!
//! _reviews._http.example.com            SRV
//!   → instances of "reviews" with an http endpoint
//!   → SRV record per instance targeting <id>.instance.example.com
//!   → A/AAAA for each target in the additional section
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use registry_dns::{DnsConfig, DnsServer, InMemoryCatalog};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DnsConfig::new(5353, "example.com");
//!     let server = DnsServer::builder(config)
//!         .discovery(Arc::new(InMemoryCatalog::new()))
//!         .build()
//!         .unwrap();
//!
//!     let shutdown = CancellationToken::new();
//!     server.run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod metrics;
pub mod query;
pub mod records;
pub mod server;
pub mod telemetry;

// Re-export main types
pub use config::{Config, DiscoveryConfig, DnsConfig, RegistryConfig, TelemetryConfig};
pub use discovery::{
    Discovery, DiscoveryError, InMemoryCatalog, InstanceFilter, InstanceRegistration,
    RegistryClient, ServiceEndpoint, ServiceInstance,
};
pub use error::{DnsError, QueryError};
pub use handler::ServiceDnsHandler;
pub use query::{LookupKey, Protocol};
pub use server::{DnsServer, DnsServerBuilder};
