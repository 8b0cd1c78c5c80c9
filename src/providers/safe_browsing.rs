//! Safe Browsing lookup-style batch backend.
//!
//! URLs are submitted in a POST body (a count line, then one URL per line)
//! and the service answers with one classification line per URL. Requests
//! are split into chunks of at most `max_urls_per_request` URLs.

use super::{AddressListItem, UrlTester};
use crate::classification::{decode_batch_lines, Classification};
use crate::config::SafeBrowsingConfig;
use crate::error::{ReputationError, Result};
use crate::orchestrator::keep_matches;
use crate::transport::HttpClient;
use crate::validation::ensure_valid_urls;
use async_trait::async_trait;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

const PROTOCOL_VERSION: &str = "3.1";

/// Batch URL lookup client.
pub struct SafeBrowsing {
    name: String,
    request_url: Url,
    max_urls_per_request: usize,
    http: Arc<dyn HttpClient>,
}

impl SafeBrowsing {
    pub fn new(
        name: impl Into<String>,
        endpoint: Url,
        client: &str,
        app_version: &str,
        api_key: &str,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let mut request_url = endpoint;
        request_url
            .query_pairs_mut()
            .append_pair("client", client)
            .append_pair("key", api_key)
            .append_pair("appver", app_version)
            .append_pair("pver", PROTOCOL_VERSION);

        Self {
            name: name.into(),
            request_url,
            max_urls_per_request: 500,
            http,
        }
    }

    /// Limit the number of URLs sent in a single request.
    pub fn with_max_urls_per_request(mut self, max: usize) -> Self {
        self.max_urls_per_request = max.max(1);
        self
    }

    /// Create a client from its configuration.
    pub fn from_config(
        config: &SafeBrowsingConfig,
        http: Arc<dyn HttpClient>,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        Ok(Self::new(
            config.name.clone(),
            endpoint,
            &config.client,
            &config.app_version,
            &config.api_key,
            http,
        )
        .with_max_urls_per_request(config.max_urls_per_request))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate the URLs and split the distinct ones into request chunks.
    fn chunks<'a>(&self, urls: &[&'a str]) -> Result<Vec<Vec<&'a str>>> {
        ensure_valid_urls(urls)?;

        let mut seen = HashSet::new();
        let distinct: Vec<&str> = urls.iter().copied().filter(|u| seen.insert(*u)).collect();

        Ok(distinct
            .chunks(self.max_urls_per_request)
            .map(|chunk| chunk.to_vec())
            .collect())
    }

    /// Submit one chunk; position `i` of the result classifies URL `i`.
    async fn query_chunk(&self, urls: &[&str]) -> Result<Vec<Option<Classification>>> {
        let body = format!("{}\n{}", urls.len(), urls.join("\n"));
        debug!(list = %self.name, urls = urls.len(), "Submitting URL batch");

        let response = self.http.post(self.request_url.as_str(), body).await?;
        match response.status {
            200 => decode_batch_lines(&self.name, &response.body, urls.len()),
            204 => Ok(vec![None; urls.len()]),
            401 => {
                warn!(list = %self.name, "API key rejected");
                Err(ReputationError::UnauthorizedApiKey {
                    backend: self.name.clone(),
                })
            }
            status => Err(ReputationError::HttpStatus {
                backend: self.name.clone(),
                status,
            }),
        }
    }

    async fn lookup_chunk(&self, urls: Vec<&str>) -> Result<Vec<AddressListItem>> {
        let classes = self.query_chunk(&urls).await?;
        Ok(urls
            .into_iter()
            .zip(classes)
            .filter_map(|(url, class)| {
                class.map(|c| AddressListItem::new(url, self.name.clone(), c))
            })
            .collect())
    }
}

#[async_trait]
impl UrlTester for SafeBrowsing {
    async fn any_match(&self, urls: &[&str]) -> Result<bool> {
        for chunk in self.chunks(urls)? {
            if self.query_chunk(&chunk).await?.iter().any(Option::is_some) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn filter_matching<'a>(&'a self, urls: &'a [&'a str]) -> BoxStream<'a, Result<String>> {
        self.lookup_matching(urls).map_ok(|item| item.value).boxed()
    }

    fn lookup_matching<'a>(
        &'a self,
        urls: &'a [&'a str],
    ) -> BoxStream<'a, Result<AddressListItem>> {
        let chunks = match self.chunks(urls) {
            Ok(chunks) => chunks,
            Err(e) => return stream::once(future::ready(Err(e))).boxed(),
        };

        // One request per chunk, issued only when the previous chunk's
        // matches have been consumed.
        let answers = stream::iter(chunks)
            .then(move |chunk| self.lookup_chunk(chunk))
            .map_ok(|items| {
                stream::iter(
                    items
                        .into_iter()
                        .map(|item| Ok::<_, ReputationError>(Some(item))),
                )
            })
            .try_flatten();

        keep_matches(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::FakeHttp;
    use crate::transport::HttpResponse;

    /// Answers like the service for the given listed URLs.
    fn service(listed: &'static [&'static str]) -> FakeHttp {
        FakeHttp::new(move |_, body| {
            let urls: Vec<&str> = body.unwrap_or_default().lines().skip(1).collect();
            if !urls.iter().any(|u| listed.iter().any(|l| l == u)) {
                return HttpResponse::new(204, "");
            }
            let lines: Vec<&str> = urls
                .iter()
                .map(|u| if listed.iter().any(|l| l == u) { "malware" } else { "ok" })
                .collect();
            HttpResponse::new(200, lines.join("\n"))
        })
    }

    fn build(http: FakeHttp) -> (SafeBrowsing, Arc<FakeHttp>) {
        let http = Arc::new(http);
        let endpoint = Url::parse("https://sb-ssl.google.com/safebrowsing/api/lookup").unwrap();
        let client = SafeBrowsing::new("gsb", endpoint, "test_client", "0.1", "test_key", http.clone());
        (client, http)
    }

    fn malware() -> Classification {
        ["malware".to_string()].into()
    }

    #[test]
    fn test_request_url() {
        let (client, _) = build(service(&[]));
        assert_eq!(
            client.request_url.as_str(),
            "https://sb-ssl.google.com/safebrowsing/api/lookup?client=test_client&key=test_key&appver=0.1&pver=3.1"
        );
    }

    #[tokio::test]
    async fn test_request_body() {
        let (client, http) = build(service(&[]));
        let urls = ["http://a.com/", "http://b.com/"];

        assert!(!client.any_match(&urls).await.unwrap());
        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].1.as_deref(), Some("2\nhttp://a.com/\nhttp://b.com/"));
    }

    #[tokio::test]
    async fn test_any_match() {
        let (client, _) = build(service(&["http://www.gumblar.cn/"]));

        assert!(client
            .any_match(&["http://www.google.com/", "http://www.gumblar.cn/"])
            .await
            .unwrap());
        assert!(!client
            .any_match(&["http://www.google.com/", "https://github.com/"])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_lookup_matching_reports_url() {
        let (client, _) = build(service(&["http://www.gumblar.cn/"]));
        let urls = ["http://www.google.com/", "http://www.gumblar.cn/"];

        let items: Vec<_> = client.lookup_matching(&urls).try_collect().await.unwrap();
        assert_eq!(
            items,
            vec![AddressListItem::new("http://www.gumblar.cn/", "gsb", malware())]
        );

        let matched: Vec<_> = client.filter_matching(&urls).try_collect().await.unwrap();
        assert_eq!(matched, vec!["http://www.gumblar.cn/"]);
    }

    #[tokio::test]
    async fn test_multiple_classes_per_line() {
        let (client, _) = build(FakeHttp::new(|_, _| HttpResponse::new(200, "ok\nphishing,malware")));
        let urls = ["http://a.com/", "http://b.com/"];

        let items: Vec<_> = client.lookup_matching(&urls).try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].value, "http://b.com/");
        assert_eq!(
            items[0].classification,
            Classification::from(["malware".to_string(), "phishing".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unauthorized_api_key() {
        let (client, _) = build(FakeHttp::new(|_, _| HttpResponse::new(401, "")));
        let urls = ["http://a.com/", "http://b.com/"];

        assert!(matches!(
            client.any_match(&urls).await,
            Err(ReputationError::UnauthorizedApiKey { .. })
        ));
        let result: Result<Vec<_>> = client.lookup_matching(&urls).try_collect().await;
        assert!(matches!(result, Err(ReputationError::UnauthorizedApiKey { .. })));
        let result: Result<Vec<_>> = client.filter_matching(&urls).try_collect().await;
        assert!(matches!(result, Err(ReputationError::UnauthorizedApiKey { .. })));
    }

    #[tokio::test]
    async fn test_other_error_status() {
        let (client, _) = build(FakeHttp::new(|_, _| HttpResponse::new(503, "")));

        assert!(matches!(
            client.any_match(&["http://a.com/"]).await,
            Err(ReputationError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_line_count_mismatch() {
        let (client, _) = build(FakeHttp::new(|_, _| HttpResponse::new(200, "malware")));
        let urls = ["http://a.com/", "http://b.com/"];

        let result: Result<Vec<_>> = client.lookup_matching(&urls).try_collect().await;
        assert!(matches!(result, Err(ReputationError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_invalid_urls_rejected_before_request() {
        let (client, http) = build(service(&[]));
        let urls = ["http://a.com/", "invalid"];

        assert!(matches!(
            client.any_match(&urls).await,
            Err(ReputationError::InvalidUrl(_))
        ));
        let result: Result<Vec<_>> = client.lookup_matching(&urls).try_collect().await;
        assert!(matches!(result, Err(ReputationError::InvalidUrl(_))));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn test_batches_split_and_ordered() {
        let (client, http) = build(service(&["http://a.com/", "http://d.com/", "http://e.com/"]));
        let client = client.with_max_urls_per_request(2);
        let urls = [
            "http://a.com/",
            "http://b.com/",
            "http://c.com/",
            "http://d.com/",
            "http://e.com/",
        ];

        let matched: Vec<_> = client.filter_matching(&urls).try_collect().await.unwrap();
        assert_eq!(matched, vec!["http://a.com/", "http://d.com/", "http://e.com/"]);
        assert_eq!(http.request_count(), 3);
    }

    #[tokio::test]
    async fn test_next_batch_sent_only_when_needed() {
        let (client, http) = build(service(&["http://a.com/", "http://c.com/"]));
        let client = client.with_max_urls_per_request(2);
        let urls = ["http://a.com/", "http://b.com/", "http://c.com/"];

        let mut matches = client.lookup_matching(&urls);
        assert_eq!(matches.next().await.unwrap().unwrap().value, "http://a.com/");
        drop(matches);
        assert_eq!(http.request_count(), 1);

        assert!(client.any_match(&urls).await.unwrap());
        assert_eq!(http.request_count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_urls_submitted_once() {
        let (client, http) = build(service(&["http://a.com/"]));
        let urls = ["http://a.com/", "http://b.com/", "http://a.com/"];

        let items: Vec<_> = client.lookup_matching(&urls).try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].1.as_deref(), Some("2\nhttp://a.com/\nhttp://b.com/"));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let (client, http) = build(service(&[]));

        assert!(!client.any_match(&[]).await.unwrap());
        let items: Vec<_> = client.lookup_matching(&[]).try_collect().await.unwrap();
        assert!(items.is_empty());
        assert_eq!(http.request_count(), 0);
    }
}
