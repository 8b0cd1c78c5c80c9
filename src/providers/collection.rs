//! In-memory host collection backend.

use super::{AddressListItem, HostList};
use crate::cache::HostCache;
use crate::classification::Classification;
use crate::config::{CollectionFormat, HostCollectionConfig};
use crate::error::Result;
use crate::host::{Host, HostFactory, HostKind};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A local list of hosts sharing one classification.
///
/// A stored domain also matches its subdomains, so an entry for
/// `example.com` lists `mail.example.com`. Adding hosts needs `&mut self`;
/// share the collection behind an `Arc` once it is filled.
pub struct HostCollection {
    name: String,
    classification: Classification,
    hosts: Vec<Host>,
    host_factory: HostFactory,
}

impl HostCollection {
    pub fn new(name: impl Into<String>, classification: Classification) -> Self {
        Self {
            name: name.into(),
            classification,
            hosts: Vec::new(),
            host_factory: HostFactory::new(HostKind::Any),
        }
    }

    /// Memoize parsed hosts in a shared cache.
    pub fn with_host_cache(mut self, cache: Arc<HostCache>) -> Self {
        self.host_factory = self.host_factory.with_cache(cache);
        self
    }

    /// Create a collection from its configuration, loading its file if set.
    pub fn from_config(
        config: &HostCollectionConfig,
        cache: Option<Arc<HostCache>>,
    ) -> anyhow::Result<Self> {
        let classification = config.classification.iter().cloned().collect();
        let mut collection = Self::new(config.name.clone(), classification);
        if let Some(cache) = cache {
            collection = collection.with_host_cache(cache);
        }

        for host in &config.hosts {
            collection.add(host)?;
        }
        if let Some(path) = &config.path {
            collection.load(path, config.format)?;
        }

        Ok(collection)
    }

    /// Validate, normalize and store a host. Adding a stored host again
    /// changes nothing.
    pub fn add(&mut self, value: &str) -> Result<()> {
        let host = self.host_factory.create(value)?;
        if !self.hosts.contains(&host) {
            self.hosts.push(host);
        }
        Ok(())
    }

    /// Add every host listed in a file. Invalid entries are skipped.
    ///
    /// Returns the number of entries read from the file.
    pub fn load(&mut self, path: &Path, format: CollectionFormat) -> anyhow::Result<usize> {
        let entries = load_entries(path, format)?;
        let count = entries.len();

        for entry in entries {
            if let Err(e) = self.add(&entry) {
                warn!(
                    collection = %self.name,
                    entry = %entry,
                    error = %e,
                    "Skipping invalid host collection entry"
                );
            }
        }

        info!(
            collection = %self.name,
            path = %path.display(),
            entries = count,
            hosts = self.hosts.len(),
            "Host collection loaded"
        );

        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Stored entry that lists the host, if any.
    fn find(&self, host: &Host) -> Option<&Host> {
        self.hosts.iter().find(|stored| host.is_match(stored))
    }
}

#[async_trait]
impl HostList for HostCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn contains(&self, host: &str) -> Result<bool> {
        let host = self.host_factory.create(host)?;
        Ok(self.find(&host).is_some())
    }

    async fn lookup(&self, host: &str) -> Result<Option<AddressListItem>> {
        let host = self.host_factory.create(host)?;
        let Some(stored) = self.find(&host) else {
            return Ok(None);
        };

        debug!(collection = %self.name, host = %host, entry = %stored, "Host listed");
        Ok(Some(AddressListItem::new(
            stored.to_string(),
            self.name.clone(),
            self.classification.clone(),
        )))
    }
}

/// Read the raw entries of a host collection file.
fn load_entries(path: &Path, format: CollectionFormat) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;

    match format {
        CollectionFormat::Plain => Ok(plain_entries(&content)),
        CollectionFormat::Csv => Ok(csv_entries(&content)),
        CollectionFormat::Json => json_entries(&content),
    }
}

fn content_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// One host per line, `#` starts a comment line.
fn plain_entries(content: &str) -> Vec<String> {
    content_lines(content).map(str::to_string).collect()
}

/// Host in the first column.
fn csv_entries(content: &str) -> Vec<String> {
    content_lines(content)
        .filter_map(|line| line.split(',').next())
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect()
}

/// JSON array of host strings.
fn json_entries(content: &str) -> anyhow::Result<Vec<String>> {
    let hosts: Vec<String> = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid JSON host collection: {}", e))?;
    Ok(hosts.into_iter().map(|host| host.trim().to_string()).collect())
}
