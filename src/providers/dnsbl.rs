//! DNS blackhole list backend.

use super::{AddressListItem, HostList};
use crate::cache::HostCache;
use crate::classification::CodeTable;
use crate::config::DnsblConfig;
use crate::error::Result;
use crate::host::{Host, HostFactory};
use crate::transport::DnsResolver;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::debug;

/// A DNSBL queried as `<reversed ip or domain>.<query suffix>`.
///
/// Any answer means the host is listed; the last octet of each returned
/// address is a return code decoded with the list's [`CodeTable`].
pub struct Dnsbl {
    name: String,
    query_suffix: String,
    codes: CodeTable,
    host_factory: HostFactory,
    resolver: Arc<dyn DnsResolver>,
}

impl Dnsbl {
    pub fn new(
        name: impl Into<String>,
        query_suffix: &str,
        codes: CodeTable,
        host_factory: HostFactory,
        resolver: Arc<dyn DnsResolver>,
    ) -> Self {
        Self {
            name: name.into(),
            query_suffix: query_suffix.trim_matches('.').to_ascii_lowercase(),
            codes,
            host_factory,
            resolver,
        }
    }

    /// Create a DNSBL from its configuration.
    pub fn from_config(
        config: &DnsblConfig,
        resolver: Arc<dyn DnsResolver>,
        cache: Option<Arc<HostCache>>,
    ) -> Self {
        let mut host_factory = HostFactory::new(config.host_kind);
        if config.registered_domain {
            host_factory = host_factory.with_registered_domain();
        }
        if let Some(cache) = cache {
            host_factory = host_factory.with_cache(cache);
        }

        Self::new(
            config.name.clone(),
            &config.query_suffix,
            config.code_table(),
            host_factory,
            resolver,
        )
    }

    pub fn query_suffix(&self) -> &str {
        &self.query_suffix
    }

    /// Fully qualified name queried for a host.
    pub fn query_name(&self, host: &Host) -> String {
        format!("{}.{}.", host.dnsbl_name(), self.query_suffix)
    }

    async fn query(&self, host: &Host) -> Result<Option<Vec<Ipv4Addr>>> {
        let name = self.query_name(host);
        debug!(dnsbl = %self.name, query = %name, "Querying DNSBL");
        self.resolver.query(&name).await
    }
}

#[async_trait]
impl HostList for Dnsbl {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, host: &Host) -> bool {
        self.host_factory.accepts(host)
    }

    async fn contains(&self, host: &str) -> Result<bool> {
        let host = self.host_factory.create(host)?;
        Ok(self.query(&host).await?.is_some())
    }

    async fn lookup(&self, host: &str) -> Result<Option<AddressListItem>> {
        let host = self.host_factory.create(host)?;
        let Some(answers) = self.query(&host).await? else {
            return Ok(None);
        };

        let codes = answers.iter().map(|addr| u32::from(addr.octets()[3]));
        let classification = self.codes.decode(codes)?;

        debug!(
            dnsbl = %self.name,
            host = %host,
            classification = ?classification,
            "Host listed"
        );

        Ok(Some(AddressListItem::new(
            host.to_string(),
            self.name.clone(),
            classification,
        )))
    }
}
