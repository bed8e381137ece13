//! Service discovery interface consumed by the DNS front end.
//!
//! The catalog itself lives elsewhere; this module only defines the shape of
//! what it returns and the [`Discovery`] trait used to query it.

pub mod memory;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::query::Protocol;

pub use memory::{InMemoryCatalog, InstanceRegistration};
pub use registry::RegistryClient;

/// Number of hex characters kept from the instance ID digest.
const INSTANCE_ID_LEN: usize = 16;

/// Network endpoint of a service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Endpoint type: `tcp`, `udp`, `http`, `https`, or anything else the
    /// catalog stores.
    #[serde(rename = "type")]
    pub endpoint_type: String,
    /// `host`, `host:port`, or a URL.
    pub value: String,
}

impl ServiceEndpoint {
    /// Create an endpoint.
    pub fn new(endpoint_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            endpoint_type: endpoint_type.into(),
            value: value.into(),
        }
    }

    /// Known protocol of this endpoint, if any. The type must be lowercase.
    pub fn protocol(&self) -> Option<Protocol> {
        Protocol::from_endpoint_type(&self.endpoint_type)
    }
}

/// One running endpoint of a service, as held by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Catalog-unique instance ID.
    pub id: String,
    /// Service this instance belongs to.
    pub service_name: String,
    /// Where the instance can be reached.
    pub endpoint: ServiceEndpoint,
    /// Tags attached at registration.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Filter passed to [`Discovery::list_instances`].
///
/// The default filter matches every instance in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    /// Only instances of this service.
    pub service_name: Option<String>,
    /// Only instances carrying all of these tags.
    pub tags: Vec<String>,
}

impl InstanceFilter {
    /// Filter on a service name and tag set.
    pub fn service(service_name: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
            tags,
        }
    }

    /// Check whether an instance satisfies this filter.
    pub fn matches(&self, instance: &ServiceInstance) -> bool {
        if let Some(ref name) = self.service_name {
            if &instance.service_name != name {
                return false;
            }
        }
        self.tags.iter().all(|tag| instance.tags.contains(tag))
    }
}

/// Errors surfaced by a discovery backend.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// HTTP transport error talking to the registry.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("registry returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The registry URL is malformed.
    #[error("invalid registry URL: {0}")]
    InvalidUrl(String),

    /// Backend is not able to serve lookups.
    #[error("discovery backend unavailable: {0}")]
    Unavailable(String),
}

/// Query interface of the service catalog.
///
/// Implementations must be safe to share between concurrently handled DNS
/// requests.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// List the instances matching `filter`.
    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<ServiceInstance>, DiscoveryError>;
}

/// Compute the deterministic ID of an instance.
///
/// The same logical endpoint always hashes to the same ID, so duplicate
/// registrations across catalog replicas collapse onto one instance.
pub fn instance_id(
    service_hostname: &str,
    service_address: &str,
    endpoint_address: &str,
    endpoint_port: &str,
) -> String {
    let joined = [
        service_hostname,
        service_address,
        endpoint_address,
        endpoint_port,
    ]
    .join("/");
    let digest = Sha256::digest(joined.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(INSTANCE_ID_LEN);
    id
}
