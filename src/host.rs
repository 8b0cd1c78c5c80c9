//! Normalized host values and the factories backends use to build them.

use crate::cache::HostCache;
use crate::error::{ReputationError, Result};
use crate::validation::ensure_valid_host;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;

/// A domain name stored as lowercase labels, without the trailing root dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hostname {
    labels: Vec<String>,
}

impl Hostname {
    fn new(value: &str) -> Self {
        let labels = value
            .trim_end_matches('.')
            .split('.')
            .map(str::to_ascii_lowercase)
            .collect();
        Self { labels }
    }

    /// True if this name ends with all labels of `other` and has more of them.
    pub fn is_subdomain(&self, other: &Hostname) -> bool {
        self.labels.len() > other.labels.len() && self.labels.ends_with(&other.labels)
    }

    /// Registrable part of the name under the public suffix list, such as
    /// `example.co.uk` for `www.example.co.uk`.
    ///
    /// Returns `None` for a bare public suffix.
    pub fn registered_domain(&self) -> Option<Hostname> {
        psl::domain_str(&self.to_string()).map(Hostname::new)
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels.join("."))
    }
}

/// An IP address or a domain name that has passed syntax validation.
///
/// Two hosts are equal when their normalized forms are equal, so
/// `2001:db8::1` equals `2001:0db8:0:0:0:0:0:1` and `Example.com.` equals
/// `example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Domain(Hostname),
}

impl Host {
    /// Validate and normalize a raw host string.
    pub fn parse(value: &str) -> Result<Self> {
        ensure_valid_host(value)?;

        if let Ok(addr) = value.parse::<Ipv4Addr>() {
            return Ok(Host::Ipv4(addr));
        }
        if let Ok(addr) = value.parse::<Ipv6Addr>() {
            return Ok(Host::Ipv6(addr));
        }
        Ok(Host::Domain(Hostname::new(value)))
    }

    pub fn is_ip(&self) -> bool {
        matches!(self, Host::Ipv4(_) | Host::Ipv6(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, Host::Ipv6(_))
    }

    /// True if this host is a strict subdomain of `other`.
    ///
    /// IP addresses are never subdomains, and nothing is a subdomain of an
    /// IP address.
    pub fn is_subdomain(&self, other: &Host) -> bool {
        match (self, other) {
            (Host::Domain(this), Host::Domain(other)) => this.is_subdomain(other),
            _ => false,
        }
    }

    /// True if this host equals `other` or is one of its subdomains.
    pub fn is_match(&self, other: &Host) -> bool {
        self == other || self.is_subdomain(other)
    }

    /// Reduce a domain to its registered domain; IP addresses and bare
    /// public suffixes are returned unchanged.
    pub fn into_registered_domain(self) -> Host {
        match self {
            Host::Domain(name) => match name.registered_domain() {
                Some(registered) => Host::Domain(registered),
                None => Host::Domain(name),
            },
            host => host,
        }
    }

    /// Name prepended to a DNSBL zone when querying for this host.
    ///
    /// IPv4 octets are reversed, IPv6 is expanded to nibbles and reversed,
    /// domains are used as they are.
    pub fn dnsbl_name(&self) -> String {
        match self {
            Host::Ipv4(addr) => {
                let o = addr.octets();
                format!("{}.{}.{}.{}", o[3], o[2], o[1], o[0])
            }
            Host::Ipv6(addr) => addr
                .octets()
                .iter()
                .rev()
                .flat_map(|byte| [byte & 0x0f, byte >> 4])
                .map(|nibble| format!("{nibble:x}"))
                .collect::<Vec<_>>()
                .join("."),
            Host::Domain(name) => name.to_string(),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ipv4(addr) => write!(f, "{addr}"),
            Host::Ipv6(addr) => write!(f, "{addr}"),
            Host::Domain(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for Host {
    type Err = ReputationError;

    fn from_str(s: &str) -> Result<Self> {
        Host::parse(s)
    }
}

/// Kinds of host a backend accepts.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    /// IP addresses and domain names.
    #[default]
    Any,
    /// IP addresses only.
    Ip,
    /// Domain names only.
    Domain,
}

impl HostKind {
    fn accepts(&self, host: &Host) -> bool {
        match self {
            HostKind::Any => true,
            HostKind::Ip => host.is_ip(),
            HostKind::Domain => !host.is_ip(),
        }
    }
}

/// Builds [`Host`] values for one backend.
///
/// The optional cache only saves repeated parsing; results are identical
/// with or without it.
#[derive(Clone, Default)]
pub struct HostFactory {
    kind: HostKind,
    registered_domain: bool,
    cache: Option<Arc<HostCache>>,
}

impl HostFactory {
    pub fn new(kind: HostKind) -> Self {
        Self {
            kind,
            registered_domain: false,
            cache: None,
        }
    }

    /// Query domains by their registered domain, so `www.example.com`
    /// becomes `example.com`.
    pub fn with_registered_domain(mut self) -> Self {
        self.registered_domain = true;
        self
    }

    /// Memoize parsed hosts in a (possibly shared) cache.
    pub fn with_cache(mut self, cache: Arc<HostCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check if a parsed host is of a kind this factory accepts.
    pub fn accepts(&self, host: &Host) -> bool {
        self.kind.accepts(host)
    }

    /// Validate, normalize and kind-check a raw host value.
    pub fn create(&self, value: &str) -> Result<Host> {
        let host = match self.cache.as_ref().and_then(|c| c.get(value)) {
            Some(host) => host,
            None => {
                let host = Host::parse(value)?;
                if let Some(cache) = &self.cache {
                    cache.insert(value, host.clone());
                }
                host
            }
        };

        if !self.kind.accepts(&host) {
            return Err(ReputationError::InvalidHost(value.to_string()));
        }

        if self.registered_domain {
            Ok(host.into_registered_domain())
        } else {
            Ok(host)
        }
    }
}
