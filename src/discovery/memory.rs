//! In-memory service catalog.
//!
//! Holds instances in registration order behind a `parking_lot::RwLock`.
//! Backs the `static` discovery mode of the binary and doubles as the fake
//! catalog in tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{instance_id, Discovery, DiscoveryError, InstanceFilter, ServiceEndpoint, ServiceInstance};

/// Registration request for an instance whose ID is derived by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRegistration {
    /// Service name.
    pub service_name: String,
    /// Optional virtual address of the service, part of the ID hash.
    #[serde(default)]
    pub service_address: Option<String>,
    /// Instance endpoint.
    pub endpoint: ServiceEndpoint,
    /// Instance tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl InstanceRegistration {
    /// Deterministic ID for this registration.
    pub fn instance_id(&self) -> String {
        let (address, port) = split_endpoint_value(&self.endpoint.value);
        instance_id(
            &self.service_name,
            self.service_address.as_deref().unwrap_or(""),
            address,
            port,
        )
    }
}

/// Split an endpoint value into its address and port parts for hashing.
///
/// Scheme prefixes are ignored; a value without a port yields an empty port.
fn split_endpoint_value(value: &str) -> (&str, &str) {
    let value = value
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(value);
    let authority = value
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or(value);

    if let Some(rest) = authority.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            return (host, tail.strip_prefix(':').unwrap_or(""));
        }
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, port),
        _ => (authority, ""),
    }
}

/// Thread-safe in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    inner: Arc<RwLock<Vec<ServiceInstance>>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog pre-populated with registrations.
    pub fn with_registrations(registrations: impl IntoIterator<Item = InstanceRegistration>) -> Self {
        let catalog = Self::new();
        for registration in registrations {
            catalog.register(registration);
        }
        catalog
    }

    /// Register an instance, deriving its ID.
    ///
    /// Registering the same endpoint twice replaces the earlier entry.
    pub fn register(&self, registration: InstanceRegistration) -> ServiceInstance {
        let instance = ServiceInstance {
            id: registration.instance_id(),
            service_name: registration.service_name,
            endpoint: registration.endpoint,
            tags: registration.tags,
        };
        self.upsert(instance.clone());
        instance
    }

    /// Insert or replace an instance with an explicit ID.
    pub fn upsert(&self, instance: ServiceInstance) {
        let mut inner = self.inner.write();
        debug!(
            instance_id = %instance.id,
            service = %instance.service_name,
            endpoint = %instance.endpoint.value,
            "upserting instance"
        );
        match inner.iter_mut().find(|existing| existing.id == instance.id) {
            Some(existing) => *existing = instance,
            None => inner.push(instance),
        }
    }

    /// Remove an instance by ID.
    pub fn deregister(&self, instance_id: &str) -> Option<ServiceInstance> {
        let mut inner = self.inner.write();
        let position = inner.iter().position(|i| i.id == instance_id)?;
        debug!(instance_id, "removed instance");
        Some(inner.remove(position))
    }

    /// Look up an instance by ID.
    pub fn instance(&self, instance_id: &str) -> Option<ServiceInstance> {
        self.inner
            .read()
            .iter()
            .find(|i| i.id == instance_id)
            .cloned()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True when no instance is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Remove every instance.
    pub fn clear(&self) {
        self.inner.write().clear();
        debug!("cleared catalog");
    }
}

#[async_trait]
impl Discovery for InMemoryCatalog {
    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        let inner = self.inner.read();
        Ok(inner.iter().filter(|i| filter.matches(i)).cloned().collect())
    }
}
