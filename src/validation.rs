//! Syntax checks for host and URL arguments.
//!
//! Every backend runs these before building a [`Host`](crate::host::Host) or
//! touching the network, so a malformed value never costs a query.

use crate::error::{ReputationError, Result};
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use url::Url;

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9\-_]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z0-9][a-zA-Z0-9\-_]{0,61}[a-zA-Z]\.?$",
    )
    .expect("domain pattern is valid")
});

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^[a-z0-9.\-+]*://", // scheme
        r"(?:\S+(?::\S*)?@)?",    // credentials
        r"(?:[^/:]+|\[[0-9a-f:.]+\])", // host
        r"(?::\d{2,5})?",         // port
        r"(?:[/?#]\S*)?$",        // path, query or fragment
    ))
    .expect("URL pattern is valid")
});

const MAX_DOMAIN_LENGTH: usize = 253;

/// Check if a value is a valid IPv4 address, IPv6 address or domain name.
pub fn is_valid_host(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
        || value.parse::<Ipv6Addr>().is_ok()
        || is_valid_domain(value)
}

fn is_valid_domain(value: &str) -> bool {
    value.trim_end_matches('.').len() <= MAX_DOMAIN_LENGTH && DOMAIN_REGEX.is_match(value)
}

/// Check if a value is a valid URL with a valid host.
pub fn is_valid_url(value: &str) -> bool {
    URL_REGEX.is_match(value) && url_host(value).is_some_and(|h| is_valid_host(&h))
}

/// Extract the host part of a URL as written, without IPv6 brackets.
///
/// The host is taken from the authority text rather than from the parsed
/// URL, since the parser rewrites shorthand forms such as `10.1` or
/// `0x7f.1` into full IPv4 addresses.
pub fn url_host(value: &str) -> Option<String> {
    Url::parse(value).ok()?;

    let (_, rest) = value.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = match host_port.strip_prefix('[') {
        Some(bracketed) => bracketed.split_once(']')?.0,
        None => host_port.split_once(':').map_or(host_port, |(host, _)| host),
    };

    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

/// Reject a host value that does not pass [`is_valid_host`].
pub fn ensure_valid_host(value: &str) -> Result<()> {
    if is_valid_host(value) {
        Ok(())
    } else {
        Err(ReputationError::InvalidHost(value.to_string()))
    }
}

/// Validate every URL up front and pair each one with its host.
///
/// Fails with all the invalid values at once, before any of them is queried.
pub fn url_hosts<'a>(urls: &[&'a str]) -> Result<Vec<(&'a str, String)>> {
    let mut invalid = Vec::new();
    let mut pairs = Vec::with_capacity(urls.len());

    for &url in urls {
        match url_host(url) {
            Some(host) if is_valid_url(url) => pairs.push((url, host)),
            _ => invalid.push(url.to_string()),
        }
    }

    if invalid.is_empty() {
        Ok(pairs)
    } else {
        Err(ReputationError::InvalidUrl(invalid))
    }
}

/// Validate every URL up front without extracting hosts.
pub fn ensure_valid_urls(urls: &[&str]) -> Result<()> {
    url_hosts(urls).map(|_| ())
}
