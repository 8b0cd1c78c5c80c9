//! Bounded memoization cache for parsed hosts.

use crate::host::Host;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

/// Cached host entry.
#[derive(Debug, Clone)]
struct CachedHost {
    host: Host,
    /// When this entry was cached.
    cached_at: Instant,
}

/// Thread-safe cache mapping raw host strings to parsed [`Host`] values.
///
/// Readers never block each other. Concurrent writers of the same key
/// overwrite each other.
pub struct HostCache {
    cache: RwLock<HashMap<String, CachedHost>>,
    max_entries: usize,
}

impl HostCache {
    /// Create a cache holding at most `max_entries` hosts.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Get the host parsed from `raw`, if cached.
    pub fn get(&self, raw: &str) -> Option<Host> {
        let cache = self.cache.read().ok()?;
        cache.get(raw).map(|entry| entry.host.clone())
    }

    /// Store the host parsed from `raw`.
    pub fn insert(&self, raw: &str, host: Host) {
        if self.max_entries == 0 {
            return;
        }

        let entry = CachedHost {
            host,
            cached_at: Instant::now(),
        };

        if let Ok(mut cache) = self.cache.write() {
            // Evict the oldest entry if at capacity
            if cache.len() >= self.max_entries && !cache.contains_key(raw) {
                if let Some(oldest) = cache
                    .iter()
                    .min_by_key(|(_, v)| v.cached_at)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest);
                }
            }

            cache.insert(raw.to_string(), entry);
        }
    }

    /// Get the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}
