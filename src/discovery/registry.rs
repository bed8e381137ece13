//! HTTP client for the service registry.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

use super::{Discovery, DiscoveryError, InstanceFilter, ServiceInstance};
use crate::config::RegistryConfig;

/// Path of the instance listing endpoint.
const INSTANCES_PATH: &str = "/api/v1/instances";

/// Longest error body kept in [`DiscoveryError::Status`].
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<ServiceInstance>,
}

/// Discovery client backed by the registry's HTTP API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    instances_url: String,
    token: Option<String>,
}

impl RegistryClient {
    /// Create a client for the registry described by `config`.
    pub fn new(config: &RegistryConfig) -> Result<Self, DiscoveryError> {
        let base = config.url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(DiscoveryError::InvalidUrl(config.url.clone()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("registry-dns/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            instances_url: format!("{}{}", base, INSTANCES_PATH),
            token: config.token.clone(),
        })
    }

    /// Query parameters for a filter.
    fn query_params(filter: &InstanceFilter) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(2);
        if let Some(ref name) = filter.service_name {
            params.push(("service_name", name.clone()));
        }
        if !filter.tags.is_empty() {
            params.push(("tags", filter.tags.join(",")));
        }
        params
    }
}

#[async_trait]
impl Discovery for RegistryClient {
    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        let params = Self::query_params(filter);
        trace!(url = %self.instances_url, ?params, "listing registry instances");

        let mut request = self.http.get(&self.instances_url).query(&params);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let list: InstanceList = response.json().await?;
        debug!(count = list.instances.len(), "registry returned instances");
        Ok(list.instances)
    }
}
