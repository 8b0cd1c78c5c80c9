//! Reputation list testing for hosts and URLs.
//!
//! Checks IP addresses, domain names and URLs against DNS blackhole lists,
//! HTTP list APIs and local host collections, and reports which list matched
//! and how it classified the value.
//!
//! # Features
//!
//! - **DNSBL** - Query any DNS blackhole list, with exact or bitmask return codes
//! - **hpHosts** - Query an hpHosts-style HTTP list, one host per request
//! - **Safe Browsing** - Submit URLs in batches to a Safe Browsing lookup-style API
//! - **Host Collections** - Local lists where a domain also lists its subdomains
//! - **Lazy Batches** - `filter_matching` / `lookup_matching` query a value only when it is polled
//! - **Host Cache** - Memoize parsed hosts across backends
//!
//! # Example Configuration
//!
//! ```yaml
//! settings:
//!   host_cache_size: 1024
//!
//! dnsbl:
//!   - name: "spamhaus-zen"
//!     query_suffix: "zen.spamhaus.org"
//!     host_kind: ip
//!     classification:
//!       2: "spam source"
//!
//! safe_browsing:
//!   client: "my-application"
//!   api_key: "${SAFE_BROWSING_API_KEY}"
//!
//! host_collections:
//!   - name: "denylist"
//!     hosts: ["bad.example"]
//! ```
//!
//! # Example
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use reputation_lists::{HostCollection, UrlTester};
//!
//! # async fn run() -> reputation_lists::Result<()> {
//! let mut denylist = HostCollection::new("denylist", Default::default());
//! denylist.add("bad.example")?;
//!
//! let urls = ["https://good.example/", "https://cdn.bad.example/app.js"];
//! let matched: Vec<String> = denylist.filter_matching(&urls).try_collect().await?;
//! assert_eq!(matched, vec!["https://cdn.bad.example/app.js"]);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod chain;
pub mod classification;
pub mod config;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod providers;
pub mod transport;
pub mod validation;

pub use cache::HostCache;
pub use chain::UrlTesterChain;
pub use classification::{Classification, CodeDecoding, CodeTable};
pub use config::Config;
pub use error::{ReputationError, Result};
pub use host::{Host, HostFactory, HostKind};
pub use providers::collection::HostCollection;
pub use providers::dnsbl::Dnsbl;
pub use providers::hphosts::HpHosts;
pub use providers::safe_browsing::SafeBrowsing;
pub use providers::{AddressListItem, HostList, UrlTester};
pub use transport::{DnsResolver, HttpClient, HttpResponse, ReqwestClient, SystemResolver};
