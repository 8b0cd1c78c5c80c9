//! DNS and HTTP transports used by the network-backed lists.
//!
//! Backends only see the [`DnsResolver`] and [`HttpClient`] traits, so tests
//! and embedding applications can substitute their own transports.

use crate::error::{ReputationError, Result};
use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

/// Resolves DNSBL query names.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Look up the A records of a fully qualified name.
    ///
    /// Returns `None` when the name does not exist.
    async fn query(&self, name: &str) -> Result<Option<Vec<Ipv4Addr>>>;
}

/// [`DnsResolver`] backed by the system resolver configuration.
#[derive(Clone)]
pub struct SystemResolver {
    resolver: TokioResolver,
}

impl SystemResolver {
    /// Create a resolver from the system config, falling back to defaults.
    pub fn new() -> Self {
        let resolver = TokioResolver::builder_tokio()
            .map(|b| b.build())
            .unwrap_or_else(|_| {
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build()
            });

        Self { resolver }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn query(&self, name: &str) -> Result<Option<Vec<Ipv4Addr>>> {
        match self.resolver.ipv4_lookup(name).await {
            Ok(lookup) => Ok(Some(lookup.iter().map(|record| record.0).collect())),
            Err(e) if e.is_nx_domain() || e.is_no_records_found() => {
                debug!(name = %name, "Name not found");
                Ok(None)
            }
            Err(e) => Err(ReputationError::Dns(e.to_string())),
        }
    }
}

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to HTTP list APIs.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    async fn post(&self, url: &str, body: String) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reputation-lists/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    async fn into_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().await?;
        Self::into_response(response).await
    }

    async fn post(&self, url: &str, body: String) -> Result<HttpResponse> {
        let response = self.client.post(url).body(body).send().await?;
        Self::into_response(response).await
    }
}
