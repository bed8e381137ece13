//! Dispatches parsed lookup keys to the discovery backend.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::discovery::{Discovery, InstanceFilter, ServiceInstance};
use crate::error::QueryError;
use crate::metrics;
use crate::query::{InstanceQuery, LookupKey, ServiceQuery};

/// Thin adapter over the injected discovery client.
#[derive(Clone)]
pub struct CatalogGateway {
    discovery: Arc<dyn Discovery>,
}

impl CatalogGateway {
    /// Wrap a discovery client.
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self { discovery }
    }

    /// Resolve a lookup key into the matching instances.
    ///
    /// An empty result for a service query is not an error. Backend failures
    /// are surfaced as [`QueryError::Discovery`] and never retried here.
    pub async fn resolve(&self, key: &LookupKey) -> Result<Vec<ServiceInstance>, QueryError> {
        match key {
            LookupKey::Service(query) => self.resolve_service(query).await,
            LookupKey::Instance(query) => self.resolve_instance(query).await,
        }
    }

    async fn resolve_service(&self, query: &ServiceQuery) -> Result<Vec<ServiceInstance>, QueryError> {
        let filter = InstanceFilter::service(query.service_name.clone(), query.tags.clone());
        let mut instances = self.list(&filter).await?;

        if let Some(protocol) = query.protocol {
            instances.retain(|i| i.endpoint.protocol() == Some(protocol));
        }

        debug!(
            service = %query.service_name,
            tags = ?query.tags,
            protocol = ?query.protocol,
            count = instances.len(),
            "resolved service query"
        );
        Ok(instances)
    }

    async fn resolve_instance(
        &self,
        query: &InstanceQuery,
    ) -> Result<Vec<ServiceInstance>, QueryError> {
        let instances = self.list(&InstanceFilter::default()).await?;

        instances
            .into_iter()
            .find(|i| i.id == query.instance_id)
            .map(|instance| vec![instance])
            .ok_or_else(|| QueryError::InstanceNotFound(query.instance_id.clone()))
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<Vec<ServiceInstance>, QueryError> {
        self.discovery.list_instances(filter).await.map_err(|e| {
            warn!(error = %e, ?filter, "discovery lookup failed");
            metrics::record_discovery_error();
            QueryError::Discovery(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveryError, InMemoryCatalog, ServiceEndpoint};
    use crate::query::Protocol;
    use async_trait::async_trait;

    struct FailingDiscovery;

    #[async_trait]
    impl Discovery for FailingDiscovery {
        async fn list_instances(
            &self,
            _filter: &InstanceFilter,
        ) -> Result<Vec<ServiceInstance>, DiscoveryError> {
            Err(DiscoveryError::Unavailable("registry down".to_string()))
        }
    }

    fn instance(id: &str, service: &str, kind: &str, tags: &[&str]) -> ServiceInstance {
        ServiceInstance {
            id: id.to_string(),
            service_name: service.to_string(),
            endpoint: ServiceEndpoint::new(kind, "10.0.0.1:80"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn gateway() -> CatalogGateway {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(instance("i1", "reviews", "http", &["v1"]));
        catalog.upsert(instance("i2", "reviews", "tcp", &["v1"]));
        catalog.upsert(instance("i3", "reviews", "http", &["v2"]));
        catalog.upsert(instance("i4", "ratings", "http", &[]));
        CatalogGateway::new(Arc::new(catalog))
    }

    fn service_key(tags: &[&str], protocol: Option<Protocol>) -> LookupKey {
        LookupKey::Service(ServiceQuery {
            service_name: "reviews".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            protocol,
        })
    }

    fn ids(instances: &[ServiceInstance]) -> Vec<&str> {
        instances.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_service_query_without_filters() {
        let instances = gateway().resolve(&service_key(&[], None)).await.unwrap();
        assert_eq!(ids(&instances), vec!["i1", "i2", "i3"]);
    }

    #[tokio::test]
    async fn test_protocol_filter_is_stable() {
        let instances = gateway()
            .resolve(&service_key(&[], Some(Protocol::Http)))
            .await
            .unwrap();
        assert_eq!(ids(&instances), vec!["i1", "i3"]);
    }

    #[tokio::test]
    async fn test_tags_and_protocol_combined() {
        let instances = gateway()
            .resolve(&service_key(&["v1"], Some(Protocol::Tcp)))
            .await
            .unwrap();
        assert_eq!(ids(&instances), vec!["i2"]);
    }

    #[tokio::test]
    async fn test_empty_after_filter_is_ok() {
        let instances = gateway()
            .resolve(&service_key(&[], Some(Protocol::Udp)))
            .await
            .unwrap();
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn test_protocol_filter_compares_endpoint_type_exactly() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(instance("i1", "reviews", "http", &[]));
        catalog.upsert(instance("i2", "reviews", "HTTP", &[]));
        catalog.upsert(instance("i3", "reviews", "Http", &[]));
        let gateway = CatalogGateway::new(Arc::new(catalog));

        let instances = gateway
            .resolve(&service_key(&[], Some(Protocol::Http)))
            .await
            .unwrap();
        assert_eq!(ids(&instances), vec!["i1"]);
    }

    #[tokio::test]
    async fn test_instance_query() {
        let key = LookupKey::Instance(InstanceQuery {
            instance_id: "i4".to_string(),
        });
        let instances = gateway().resolve(&key).await.unwrap();
        assert_eq!(ids(&instances), vec!["i4"]);
    }

    #[tokio::test]
    async fn test_unknown_instance() {
        let key = LookupKey::Instance(InstanceQuery {
            instance_id: "missing".to_string(),
        });
        let err = gateway().resolve(&key).await.unwrap_err();
        assert!(matches!(err, QueryError::InstanceNotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_surfaced() {
        let gateway = CatalogGateway::new(Arc::new(FailingDiscovery));

        let err = gateway.resolve(&service_key(&[], None)).await.unwrap_err();
        assert!(matches!(err, QueryError::Discovery(_)));

        let key = LookupKey::Instance(InstanceQuery {
            instance_id: "i1".to_string(),
        });
        let err = gateway.resolve(&key).await.unwrap_err();
        assert!(matches!(err, QueryError::Discovery(_)));
    }
}
