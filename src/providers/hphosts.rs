//! hpHosts-style HTTP list backend.
//!
//! One GET request per host; the service answers `Listed,TAG1,TAG2` or
//! `Not listed`. It cannot be queried for IPv6 addresses.

use super::{AddressListItem, HostList};
use crate::cache::HostCache;
use crate::classification::{decode_listing, Listing};
use crate::config::HpHostsConfig;
use crate::error::{ReputationError, Result};
use crate::host::{Host, HostFactory, HostKind};
use crate::transport::HttpClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// HTTP list queried with `GET <endpoint>?v=<client id>&s=<host>`.
pub struct HpHosts {
    name: String,
    client_id: String,
    endpoint: Url,
    host_factory: HostFactory,
    http: Arc<dyn HttpClient>,
}

impl HpHosts {
    pub fn new(
        name: impl Into<String>,
        client_id: impl Into<String>,
        endpoint: Url,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            name: name.into(),
            client_id: client_id.into(),
            endpoint,
            host_factory: HostFactory::new(HostKind::Any),
            http,
        }
    }

    /// Memoize parsed hosts in a shared cache.
    pub fn with_host_cache(mut self, cache: Arc<HostCache>) -> Self {
        self.host_factory = self.host_factory.with_cache(cache);
        self
    }

    /// Create an hpHosts client from its configuration.
    pub fn from_config(
        config: &HpHostsConfig,
        http: Arc<dyn HttpClient>,
        cache: Option<Arc<HostCache>>,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        let mut client = Self::new(config.name.clone(), config.client_id.clone(), endpoint, http);
        if config.registered_domain {
            client.host_factory = client.host_factory.with_registered_domain();
        }
        if let Some(cache) = cache {
            client = client.with_host_cache(cache);
        }
        Ok(client)
    }

    fn request_url(&self, host: &Host, classification: bool) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("v", &self.client_id)
                .append_pair("s", &host.to_string());
            if classification {
                query.append_pair("class", "true");
            }
        }
        url
    }

    async fn query(&self, value: &str, classification: bool) -> Result<(Host, Listing)> {
        let host = self.host_factory.create(value)?;
        if host.is_ipv6() {
            return Err(ReputationError::UnsupportedHost {
                backend: self.name.clone(),
                host: value.to_string(),
            });
        }

        let url = self.request_url(&host, classification);
        debug!(list = %self.name, host = %host, "Querying HTTP list");

        let response = self.http.get(url.as_str()).await?;
        if !response.is_success() {
            return Err(ReputationError::HttpStatus {
                backend: self.name.clone(),
                status: response.status,
            });
        }

        let listing = decode_listing(&self.name, &response.body)?;
        Ok((host, listing))
    }
}

#[async_trait]
impl HostList for HpHosts {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, host: &Host) -> bool {
        !host.is_ipv6()
    }

    async fn contains(&self, host: &str) -> Result<bool> {
        let (_, listing) = self.query(host, false).await?;
        Ok(listing != Listing::NotListed)
    }

    async fn lookup(&self, host: &str) -> Result<Option<AddressListItem>> {
        match self.query(host, true).await? {
            (_, Listing::NotListed) => Ok(None),
            (host, Listing::Listed(classification)) => Ok(Some(AddressListItem::new(
                host.to_string(),
                self.name.clone(),
                classification,
            ))),
        }
    }
}
