//! Several reputation lists queried as one.

use crate::cache::HostCache;
use crate::config::Config;
use crate::error::Result;
use crate::host::Host;
use crate::orchestrator::{any_host_match, keep_matches, lookup_url_hosts, stop_after_error};
use crate::providers::collection::HostCollection;
use crate::providers::dnsbl::Dnsbl;
use crate::providers::hphosts::HpHosts;
use crate::providers::safe_browsing::SafeBrowsing;
use crate::providers::{AddressListItem, HostList, UrlTester};
use crate::transport::{DnsResolver, HttpClient};
use crate::validation::url_hosts;
use async_trait::async_trait;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A backend of the chain.
enum Member {
    /// Accepts whole URLs only.
    Urls(Arc<dyn UrlTester>),
    /// Accepts single hosts, and URLs through their host.
    Hosts(Arc<dyn HostList>),
}

/// An ordered chain of URL testers.
///
/// Testers are asked in the order they were added. A host list is skipped
/// for hosts of a kind it does not accept, so an IP-only DNSBL never sees
/// domain names. Host lists can also be queried for bare hosts with
/// [`lookup_hosts`].
///
/// [`lookup_hosts`]: UrlTesterChain::lookup_hosts
#[derive(Default)]
pub struct UrlTesterChain {
    members: Vec<Member>,
}

impl UrlTesterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled backend of a configuration.
    ///
    /// Host collections come first, then DNSBLs, hpHosts and Safe Browsing.
    pub fn from_config(
        config: &Config,
        resolver: Arc<dyn DnsResolver>,
        http: Arc<dyn HttpClient>,
    ) -> anyhow::Result<Self> {
        let cache_size = config.settings.host_cache_size;
        let cache = (cache_size > 0).then(|| Arc::new(HostCache::new(cache_size)));
        let mut chain = Self::new();

        for collection_config in config.host_collections.iter().filter(|c| c.enabled) {
            match HostCollection::from_config(collection_config, cache.clone()) {
                Ok(collection) => {
                    info!(
                        name = %collection_config.name,
                        hosts = collection.len(),
                        "Host collection enabled"
                    );
                    chain.push_host_list(Arc::new(collection));
                }
                Err(e) => {
                    warn!(
                        name = %collection_config.name,
                        error = %e,
                        "Failed to load host collection"
                    );
                }
            }
        }

        for dnsbl_config in config.dnsbl.iter().filter(|d| d.enabled) {
            let dnsbl = Dnsbl::from_config(dnsbl_config, resolver.clone(), cache.clone());
            info!(
                name = %dnsbl_config.name,
                query_suffix = %dnsbl.query_suffix(),
                host_kind = ?dnsbl_config.host_kind,
                "DNSBL enabled"
            );
            chain.push_host_list(Arc::new(dnsbl));
        }

        if let Some(ref hphosts_config) = config.hphosts {
            if hphosts_config.enabled {
                let hphosts = HpHosts::from_config(hphosts_config, http.clone(), cache.clone())?;
                info!(name = %hphosts_config.name, "hpHosts list enabled");
                chain.push_host_list(Arc::new(hphosts));
            }
        }

        if let Some(ref safe_browsing_config) = config.safe_browsing {
            if safe_browsing_config.enabled {
                let safe_browsing = SafeBrowsing::from_config(safe_browsing_config, http.clone())?;
                info!(name = %safe_browsing.name(), "Safe Browsing lookup enabled");
                chain.push_url_tester(Arc::new(safe_browsing));
            }
        }

        info!(
            testers = chain.len(),
            host_lists = chain.host_lists().count(),
            "Reputation lists initialized"
        );

        Ok(chain)
    }

    /// Append a backend that only accepts URLs.
    pub fn push_url_tester(&mut self, tester: Arc<dyn UrlTester>) {
        self.members.push(Member::Urls(tester));
    }

    /// Append a backend that accepts single hosts as well as URLs.
    pub fn push_host_list<T: HostList + 'static>(&mut self, list: Arc<T>) {
        self.members.push(Member::Hosts(list));
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn host_lists(&self) -> impl Iterator<Item = &dyn HostList> {
        self.members.iter().filter_map(|member| match member {
            Member::Hosts(list) => Some(list.as_ref()),
            Member::Urls(_) => None,
        })
    }

    /// Look up bare hosts in every host list, host by host.
    ///
    /// Backends that only accept URLs are skipped, and so are host lists
    /// that do not accept the host's kind.
    pub fn lookup_hosts<'a>(
        &'a self,
        hosts: &'a [&'a str],
    ) -> BoxStream<'a, Result<AddressListItem>> {
        let queries = hosts.iter().flat_map(move |host| {
            self.host_lists()
                .filter(move |list| accepted(*list, host))
                .map(move |list| (*host, list))
        });

        let answers = stream::iter(queries).then(|(host, list)| list.lookup(host));
        keep_matches(answers)
    }

    async fn any_member_matches(&self, url: &str, host: &str) -> Result<bool> {
        for member in &self.members {
            let matched = match member {
                Member::Urls(tester) => tester.any_match(std::slice::from_ref(&url)).await?,
                Member::Hosts(list) if accepted(list.as_ref(), host) => {
                    list.contains(host).await?
                }
                Member::Hosts(_) => false,
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Check a host against the kinds a list accepts.
///
/// A host that does not parse is passed on, so the list reports it as invalid.
fn accepted(list: &dyn HostList, host: &str) -> bool {
    let keep = Host::parse(host).map_or(true, |parsed| list.accepts(&parsed));
    if !keep {
        debug!(list = list.name(), host = %host, "Host kind not accepted, skipping list");
    }
    keep
}

/// The URL/host pairs a list accepts.
fn accepted_pairs<'a>(
    list: &dyn HostList,
    pairs: &[(&'a str, String)],
) -> Vec<(&'a str, String)> {
    pairs
        .iter()
        .filter(|(_, host)| accepted(list, host))
        .cloned()
        .collect()
}

#[async_trait]
impl UrlTester for UrlTesterChain {
    async fn any_match(&self, urls: &[&str]) -> Result<bool> {
        let pairs = url_hosts(urls)?;

        for member in &self.members {
            let matched = match member {
                Member::Urls(tester) => tester.any_match(urls).await?,
                Member::Hosts(list) => {
                    any_host_match(list.as_ref(), &accepted_pairs(list.as_ref(), &pairs)).await?
                }
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn filter_matching<'a>(&'a self, urls: &'a [&'a str]) -> BoxStream<'a, Result<String>> {
        let pairs = match url_hosts(urls) {
            Ok(pairs) => pairs,
            Err(e) => return stream::once(future::ready(Err(e))).boxed(),
        };

        let answers = stream::iter(pairs).then(move |(url, host)| async move {
            self.any_member_matches(url, &host).await.map(|matched| {
                if matched {
                    debug!(url = %url, "URL matched");
                }
                matched.then(|| url.to_string())
            })
        });

        keep_matches(answers)
    }

    fn lookup_matching<'a>(
        &'a self,
        urls: &'a [&'a str],
    ) -> BoxStream<'a, Result<AddressListItem>> {
        let pairs = match url_hosts(urls) {
            Ok(pairs) => pairs,
            Err(e) => return stream::once(future::ready(Err(e))).boxed(),
        };

        let items = stream::iter(&self.members).flat_map(move |member| match member {
            Member::Urls(tester) => tester.lookup_matching(urls),
            Member::Hosts(list) => {
                lookup_url_hosts(list.as_ref(), accepted_pairs(list.as_ref(), &pairs))
            }
        });
        stop_after_error(items).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{Classification, CodeTable};
    use crate::error::ReputationError;
    use crate::host::{HostFactory, HostKind};
    use crate::transport::testing::{FakeHttp, FakeResolver};
    use crate::transport::HttpResponse;
    use futures::TryStreamExt;

    const SUFFIX: &str = "bl.test";

    fn tags(values: &[&str]) -> Classification {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn collection(hosts: &[&str]) -> Arc<HostCollection> {
        let mut collection = HostCollection::new("local", tags(&["local"]));
        for host in hosts {
            collection.add(host).unwrap();
        }
        Arc::new(collection)
    }

    fn dnsbl(resolver: Arc<FakeResolver>) -> Arc<Dnsbl> {
        Arc::new(Dnsbl::new(
            "dnsbl",
            SUFFIX,
            CodeTable::exact([(2, "spam"), (99, "broken")]),
            HostFactory::new(HostKind::Any),
            resolver,
        ))
    }

    fn chain(local: &[&str], resolver: Arc<FakeResolver>) -> UrlTesterChain {
        let mut chain = UrlTesterChain::new();
        chain.push_host_list(collection(local));
        chain.push_host_list(dnsbl(resolver));
        chain
    }

    #[tokio::test]
    async fn test_any_match_stops_at_first_tester() {
        let resolver = Arc::new(FakeResolver::default());
        let chain = chain(&["local.example"], resolver.clone());

        assert!(chain.any_match(&["http://www.local.example"]).await.unwrap());
        assert_eq!(resolver.query_count(), 0);
    }

    #[tokio::test]
    async fn test_any_match_falls_through() {
        let resolver =
            Arc::new(FakeResolver::default().with_answer("remote.example.bl.test.", &[2]));
        let chain = chain(&["local.example"], resolver.clone());

        assert!(chain.any_match(&["http://remote.example/"]).await.unwrap());
        assert!(!chain.any_match(&["http://clean.example/"]).await.unwrap());
        assert_eq!(resolver.query_count(), 2);
    }

    #[tokio::test]
    async fn test_lookup_matching_tester_by_tester() {
        let resolver = Arc::new(
            FakeResolver::default()
                .with_answer("local.example.bl.test.", &[2])
                .with_answer("remote.example.bl.test.", &[2]),
        );
        let chain = chain(&["local.example"], resolver);
        let urls = ["http://remote.example", "http://local.example/a"];

        let items: Vec<_> = chain.lookup_matching(&urls).try_collect().await.unwrap();
        assert_eq!(
            items,
            vec![
                AddressListItem::new("local.example", "local", tags(&["local"])),
                AddressListItem::new("remote.example", "dnsbl", tags(&["spam"])),
                AddressListItem::new("local.example", "dnsbl", tags(&["spam"])),
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_matching_yields_each_url_once() {
        let resolver = Arc::new(
            FakeResolver::default()
                .with_answer("local.example.bl.test.", &[2])
                .with_answer("remote.example.bl.test.", &[2]),
        );
        let chain = chain(&["local.example"], resolver);
        let urls = [
            "http://clean.example",
            "http://local.example/a",
            "http://remote.example/b",
        ];

        let matched: Vec<String> = chain.filter_matching(&urls).try_collect().await.unwrap();
        assert_eq!(matched, vec!["http://local.example/a", "http://remote.example/b"]);
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_any_query() {
        let resolver = Arc::new(FakeResolver::default());
        let chain = chain(&[], resolver.clone());
        let urls = ["http://clean.example", "no url"];

        assert!(matches!(
            chain.any_match(&urls).await,
            Err(ReputationError::InvalidUrl(_))
        ));
        let results: Vec<_> = chain.lookup_matching(&urls).collect().await;
        assert!(matches!(results.as_slice(), [Err(ReputationError::InvalidUrl(_))]));
        assert_eq!(resolver.query_count(), 0);
    }

    #[tokio::test]
    async fn test_error_ends_lookup_stream() {
        let resolver = Arc::new(
            FakeResolver::default().with_answer("stale.example.bl.test.", &[7]),
        );
        let chain = chain(&["local.example"], resolver);
        let urls = ["http://stale.example", "http://local.example"];

        let results: Vec<_> = chain.lookup_matching(&urls).collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ReputationError::UnknownCode { code: 7 })));
    }

    #[tokio::test]
    async fn test_lookup_hosts_skips_url_only_testers() {
        let resolver =
            Arc::new(FakeResolver::default().with_answer("2.0.0.127.bl.test.", &[2]));
        let http = Arc::new(FakeHttp::new(|_, _| HttpResponse::new(200, "malware")));
        let mut chain = chain(&["127.0.0.2"], resolver);
        chain.push_url_tester(Arc::new(SafeBrowsing::new(
            "sb",
            url::Url::parse("https://sb.test/lookup").unwrap(),
            "tests",
            "1.0",
            "key",
            http.clone(),
        )));

        let items: Vec<_> = chain
            .lookup_hosts(&["127.0.0.2", "127.0.0.3"])
            .try_collect()
            .await
            .unwrap();
        assert_eq!(
            items.iter().map(|i| i.source.as_str()).collect::<Vec<_>>(),
            vec!["local", "dnsbl"]
        );
        assert_eq!(http.request_count(), 0);
        assert_eq!(chain.len(), 3);
    }

    #[tokio::test]
    async fn test_from_config() {
        let yaml = r#"
dnsbl:
  - name: "test-dnsbl"
    query_suffix: "bl.test"
    classification:
      2: "spam"
  - name: "disabled"
    enabled: false
    query_suffix: "off.test"

hphosts:
  client_id: "tests"

safe_browsing:
  client: "tests"
  api_key: "key"

host_collections:
  - name: "deny"
    hosts: ["bad.example"]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let http = Arc::new(FakeHttp::new(|_, body| match body {
            Some(_) => HttpResponse::new(204, ""),
            None => HttpResponse::new(200, "Not listed"),
        }));

        let chain = UrlTesterChain::from_config(&config, resolver, http).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.host_lists().count(), 3);

        let items: Vec<_> = chain
            .lookup_matching(&["https://cdn.bad.example/x"])
            .try_collect()
            .await
            .unwrap();
        assert_eq!(items, vec![AddressListItem::new("bad.example", "deny", Classification::new())]);
    }

    #[tokio::test]
    async fn test_host_kind_not_accepted_is_skipped() {
        let resolver =
            Arc::new(FakeResolver::default().with_answer("2.0.0.127.bl.test.", &[2]));
        let mut chain = UrlTesterChain::new();
        chain.push_host_list(Arc::new(Dnsbl::new(
            "ip-only",
            SUFFIX,
            CodeTable::exact([(2, "spam")]),
            HostFactory::new(HostKind::Ip),
            resolver.clone(),
        )));
        chain.push_host_list(collection(&["bad.example"]));
        let urls = ["http://www.bad.example/", "http://127.0.0.2/"];

        assert!(chain.any_match(&urls[..1]).await.unwrap());
        assert_eq!(resolver.query_count(), 0);

        let matched: Vec<String> = chain.filter_matching(&urls).try_collect().await.unwrap();
        assert_eq!(matched, vec!["http://www.bad.example/", "http://127.0.0.2/"]);

        let items: Vec<_> = chain.lookup_matching(&urls).try_collect().await.unwrap();
        assert_eq!(
            items,
            vec![
                AddressListItem::new("127.0.0.2", "ip-only", tags(&["spam"])),
                AddressListItem::new("bad.example", "local", tags(&["local"])),
            ]
        );

        let items: Vec<_> = chain
            .lookup_hosts(&["mail.bad.example"])
            .try_collect()
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            resolver.queries.lock().unwrap().clone(),
            vec!["2.0.0.127.bl.test.", "2.0.0.127.bl.test."]
        );
    }

    #[tokio::test]
    async fn test_invalid_host_still_reaches_list() {
        let resolver = Arc::new(FakeResolver::default());
        let chain = chain(&[], resolver.clone());

        let results: Vec<_> = chain.lookup_hosts(&["not a host"]).collect().await;
        assert!(matches!(results.as_slice(), [Err(ReputationError::InvalidHost(_))]));
        assert_eq!(resolver.query_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = UrlTesterChain::new();
        assert!(chain.is_empty());
        assert!(!chain.any_match(&["http://example.com"]).await.unwrap());
    }
}
