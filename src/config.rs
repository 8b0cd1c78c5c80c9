//! Configuration types for the reputation list checker.

use crate::classification::{CodeDecoding, CodeTable};
use crate::host::HostKind;
use crate::validation::is_valid_host;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// DNS blackhole lists.
    #[serde(default)]
    pub dnsbl: Vec<DnsblConfig>,

    /// hpHosts-style HTTP list.
    #[serde(default)]
    pub hphosts: Option<HpHostsConfig>,

    /// Safe Browsing-style batch lookup API.
    #[serde(default)]
    pub safe_browsing: Option<SafeBrowsingConfig>,

    /// Local host collections (allow or deny lists).
    #[serde(default)]
    pub host_collections: Vec<HostCollectionConfig>,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Maximum number of parsed hosts to memoize (0 disables the cache).
    #[serde(default = "default_host_cache_size")]
    pub host_cache_size: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host_cache_size: default_host_cache_size(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_host_cache_size() -> usize {
    1024
}

fn default_timeout() -> u64 {
    5000
}

/// DNS blackhole list configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsblConfig {
    /// Name reported as the source of matches.
    pub name: String,

    /// Enable this list.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Zone appended to every query, e.g. `zen.spamhaus.org`.
    pub query_suffix: String,

    /// Hosts accepted by the list.
    #[serde(default)]
    pub host_kind: HostKind,

    /// Query domains by their registered domain (`www.example.com` is
    /// queried as `example.com`).
    #[serde(default)]
    pub registered_domain: bool,

    /// How return codes are looked up in the classification table.
    #[serde(default)]
    pub decoding: CodeDecoding,

    /// Return code (last octet of the answer) to classification tag.
    #[serde(default)]
    pub classification: BTreeMap<u32, String>,
}

impl DnsblConfig {
    /// Classification table of this list.
    pub fn code_table(&self) -> CodeTable {
        CodeTable::new(self.decoding, self.classification.clone())
    }

    /// Spamhaus ZEN (IP addresses).
    pub fn spamhaus_zen() -> Self {
        let sbl = "Direct UBE sources, spam operations & spam services";
        let css = "Direct snowshoe spam sources detected via automation";
        let xbl = "CBL (3rd party exploits such as proxies, trojans, etc.)";
        let pbl_isp = "End-user Non-MTA IP addresses set by ISP outbound mail policy";
        let pbl_spamhaus = "End-user Non-MTA IP addresses set by Spamhaus";

        Self {
            name: "spamhaus-zen".to_string(),
            enabled: true,
            query_suffix: "zen.spamhaus.org".to_string(),
            host_kind: HostKind::Ip,
            registered_domain: false,
            decoding: CodeDecoding::Exact,
            classification: table(&[
                (2, sbl),
                (3, css),
                (4, xbl),
                (5, xbl),
                (6, xbl),
                (7, xbl),
                (10, pbl_isp),
                (11, pbl_spamhaus),
            ]),
        }
    }

    /// Spamhaus DBL (domain names).
    pub fn spamhaus_dbl() -> Self {
        Self {
            name: "spamhaus-dbl".to_string(),
            enabled: true,
            query_suffix: "dbl.spamhaus.org".to_string(),
            host_kind: HostKind::Domain,
            registered_domain: true,
            decoding: CodeDecoding::Exact,
            classification: table(&[
                (2, "spam domain"),
                (4, "phishing domain"),
                (5, "malware domain"),
                (6, "botnet C&C domain"),
                (102, "abused legit spam"),
                (103, "abused spammed redirector domain"),
                (104, "abused legit phishing"),
                (105, "abused legit malware"),
                (106, "abused legit botnet C&C"),
            ]),
        }
    }

    /// SURBL multi (IP addresses and domain names, bitmask codes).
    pub fn surbl_multi() -> Self {
        Self {
            name: "surbl-multi".to_string(),
            enabled: true,
            query_suffix: "multi.surbl.org".to_string(),
            host_kind: HostKind::Any,
            registered_domain: true,
            decoding: CodeDecoding::Bitmask,
            classification: table(&[
                (2, "deprecated (previously SpamCop web sites)"),
                (4, "listed on PH (phishing)"),
                (8, "listed on MW (malware)"),
                (16, "listed on AB (AbuseButler web sites)"),
                (32, "listed on ABUSE (spam and abuse web sites)"),
                (64, "listed on CR (cracked sites)"),
            ]),
        }
    }
}

fn table(entries: &[(u32, &str)]) -> BTreeMap<u32, String> {
    entries.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

/// hpHosts-style HTTP list configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HpHostsConfig {
    /// Enable this list.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name reported as the source of matches.
    #[serde(default = "default_hphosts_name")]
    pub name: String,

    /// Client identifier sent with every query.
    pub client_id: String,

    /// Verification endpoint.
    #[serde(default = "default_hphosts_endpoint")]
    pub endpoint: String,

    /// Query domains by their registered domain.
    #[serde(default = "default_true")]
    pub registered_domain: bool,
}

fn default_hphosts_name() -> String {
    "hphosts".to_string()
}

fn default_hphosts_endpoint() -> String {
    "http://verify.hosts-file.net/".to_string()
}

/// Safe Browsing-style batch lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafeBrowsingConfig {
    /// Enable this list.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name reported as the source of matches.
    #[serde(default = "default_safe_browsing_name")]
    pub name: String,

    /// Client name sent with every request.
    pub client: String,

    /// Client application version.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// API key (supports ${ENV_VAR} syntax).
    pub api_key: String,

    /// Lookup endpoint.
    #[serde(default = "default_safe_browsing_endpoint")]
    pub endpoint: String,

    /// Maximum number of URLs submitted in one request.
    #[serde(default = "default_max_urls_per_request")]
    pub max_urls_per_request: usize,
}

fn default_safe_browsing_name() -> String {
    "google-safe-browsing".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_safe_browsing_endpoint() -> String {
    "https://sb-ssl.google.com/safebrowsing/api/lookup".to_string()
}

fn default_max_urls_per_request() -> usize {
    500
}

/// Local host collection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostCollectionConfig {
    /// Name reported as the source of matches.
    pub name: String,

    /// Enable this collection.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tags attached to every match.
    #[serde(default)]
    pub classification: Vec<String>,

    /// Hosts listed inline.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// File with more hosts.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Format of the file.
    #[serde(default)]
    pub format: CollectionFormat,
}

/// Host collection file format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectionFormat {
    /// Plain text, one host per line.
    #[default]
    Plain,
    /// CSV with the host in the first column.
    Csv,
    /// JSON array of hosts.
    Json,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for dnsbl in self.dnsbl.iter().filter(|d| d.enabled) {
            if dnsbl.name.is_empty() {
                anyhow::bail!("DNSBL name is empty");
            }
            if dnsbl.query_suffix.trim_matches('.').is_empty() {
                anyhow::bail!("DNSBL '{}' has an empty query_suffix", dnsbl.name);
            }
            if dnsbl.decoding == CodeDecoding::Bitmask {
                if let Some(code) = dnsbl.classification.keys().find(|c| !c.is_power_of_two()) {
                    anyhow::bail!(
                        "DNSBL '{}' uses bitmask decoding but code {} is not a single bit",
                        dnsbl.name,
                        code
                    );
                }
            }
        }

        if let Some(ref hphosts) = self.hphosts {
            if hphosts.enabled {
                if hphosts.client_id.is_empty() {
                    anyhow::bail!("hpHosts is enabled but client_id is empty");
                }
                Url::parse(&hphosts.endpoint).map_err(|e| {
                    anyhow::anyhow!("Invalid hpHosts endpoint '{}': {}", hphosts.endpoint, e)
                })?;
            }
        }

        if let Some(ref safe_browsing) = self.safe_browsing {
            if safe_browsing.enabled {
                if safe_browsing.api_key.is_empty() {
                    anyhow::bail!("Safe Browsing is enabled but api_key is empty");
                }
                if safe_browsing.max_urls_per_request == 0 {
                    anyhow::bail!("Safe Browsing max_urls_per_request must be > 0");
                }
                Url::parse(&safe_browsing.endpoint).map_err(|e| {
                    anyhow::anyhow!(
                        "Invalid Safe Browsing endpoint '{}': {}",
                        safe_browsing.endpoint,
                        e
                    )
                })?;
            }
        }

        for collection in self.host_collections.iter().filter(|c| c.enabled) {
            if let Some(path) = &collection.path {
                if !path.exists() {
                    anyhow::bail!(
                        "Host collection '{}' path does not exist: {}",
                        collection.name,
                        path.display()
                    );
                }
            }
            if let Some(host) = collection.hosts.iter().find(|h| !is_valid_host(h)) {
                anyhow::bail!(
                    "Invalid host in collection '{}': {}",
                    collection.name,
                    host
                );
            }
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Reputation Lists Configuration

settings:
  host_cache_size: 1024        # Parsed hosts to memoize (0 disables)
  timeout_ms: 5000             # HTTP request timeout

# DNS blackhole lists
dnsbl:
  - name: "spamhaus-zen"
    query_suffix: "zen.spamhaus.org"
    host_kind: ip              # any, ip or domain
    decoding: exact            # exact or bitmask
    classification:
      2: "Direct UBE sources, spam operations & spam services"
      3: "Direct snowshoe spam sources detected via automation"
      4: "CBL (3rd party exploits such as proxies, trojans, etc.)"
      10: "End-user Non-MTA IP addresses set by ISP outbound mail policy"
  - name: "surbl-multi"
    query_suffix: "multi.surbl.org"
    registered_domain: true    # query www.example.com as example.com
    decoding: bitmask
    classification:
      4: "listed on PH (phishing)"
      8: "listed on MW (malware)"
      32: "listed on ABUSE (spam and abuse web sites)"
      64: "listed on CR (cracked sites)"

# hpHosts-style HTTP list (optional)
hphosts:
  enabled: true
  client_id: "my-application"

# Safe Browsing-style lookup API (optional)
safe_browsing:
  enabled: true
  client: "my-application"
  api_key: "${SAFE_BROWSING_API_KEY}"  # Use environment variable
  max_urls_per_request: 500

# Local host collections; subdomains of listed domains match too
host_collections:
  - name: "internal-denylist"
    classification: ["internal"]
    hosts:
      - "bad.example"
      - "192.0.2.1"
    path: "/etc/reputation-lists/denylist.txt"
    format: plain              # plain, csv, or json
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
