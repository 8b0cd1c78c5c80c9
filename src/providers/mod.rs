//! Reputation list backends and the contracts they share.
//!
//! Every backend that can be asked about one host implements [`HostList`];
//! the blanket implementation then makes it a [`UrlTester`] by testing the
//! host part of each URL. Backends that only accept whole URLs implement
//! [`UrlTester`] directly.

pub mod collection;
pub mod dnsbl;
pub mod hphosts;
pub mod safe_browsing;

use crate::classification::Classification;
use crate::error::Result;
use crate::host::Host;
use crate::orchestrator;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A value found on a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressListItem {
    /// Matched host or URL, in the form the backend reports it.
    pub value: String,

    /// Name of the backend that reported the match.
    pub source: String,

    /// Classification tags; may be empty for lists without classes.
    pub classification: Classification,
}

impl AddressListItem {
    pub fn new(
        value: impl Into<String>,
        source: impl Into<String>,
        classification: Classification,
    ) -> Self {
        Self {
            value: value.into(),
            source: source.into(),
            classification,
        }
    }
}

/// A list that can be queried for a single host.
#[async_trait]
pub trait HostList: Send + Sync {
    /// Backend name, reported as the source of its matches.
    fn name(&self) -> &str;

    /// Whether the list can be queried for this kind of host at all.
    ///
    /// `contains` and `lookup` fail for hosts it does not accept.
    fn accepts(&self, _host: &Host) -> bool {
        true
    }

    /// Check if a host is listed.
    async fn contains(&self, host: &str) -> Result<bool>;

    /// Get the listing of a host, or `None` if it is not listed.
    async fn lookup(&self, host: &str) -> Result<Option<AddressListItem>>;
}

/// A list that can be queried for URLs.
///
/// All URLs are validated before the first query. The streams are lazy:
/// a value is only queried when the stream is polled for it, and the stream
/// ends after yielding an error.
#[async_trait]
pub trait UrlTester: Send + Sync {
    /// Check if any of the URLs is listed, stopping at the first match.
    async fn any_match(&self, urls: &[&str]) -> Result<bool>;

    /// Yield the listed URLs, in input order.
    fn filter_matching<'a>(&'a self, urls: &'a [&'a str]) -> BoxStream<'a, Result<String>>;

    /// Yield an item for every listed URL, in input order.
    fn lookup_matching<'a>(
        &'a self,
        urls: &'a [&'a str],
    ) -> BoxStream<'a, Result<AddressListItem>>;
}

#[async_trait]
impl<T: HostList + ?Sized> UrlTester for T {
    async fn any_match(&self, urls: &[&str]) -> Result<bool> {
        orchestrator::any_match(self, urls).await
    }

    fn filter_matching<'a>(&'a self, urls: &'a [&'a str]) -> BoxStream<'a, Result<String>> {
        orchestrator::filter_matching(self, urls)
    }

    fn lookup_matching<'a>(
        &'a self,
        urls: &'a [&'a str],
    ) -> BoxStream<'a, Result<AddressListItem>> {
        orchestrator::lookup_matching(self, urls)
    }
}
