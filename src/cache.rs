//! Process-wide display-address cache.
//!
//! Keys are fixed-precision GCJ-02 coordinates, computed AFTER the datum
//! transform so two WGS-84 inputs landing on the same shifted point share one
//! entry. The cache is unbounded and append-only for the process lifetime:
//! real-world trip endpoints repeat heavily and a resolved label never
//! changes, so there is no eviction and no TTL.
//!
//! Concurrent writers may race on the same key; every writer computes the
//! identical value for that key, so the overwrite is idempotent and no
//! cross-key coordination is needed beyond the map lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

/// Cache key for a transformed coordinate, fixed to 6 decimal places
/// (~0.1 m), the provider's own coordinate resolution.
pub fn cache_key(gcj_lng: f64, gcj_lat: f64) -> String {
    format!("{:.6},{:.6}", gcj_lng, gcj_lat)
}

/// Shared map from GCJ-02 cache key to resolved display address.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: Mutex<HashMap<String, String>>,
}

static SHARED: Lazy<Arc<AddressCache>> = Lazy::new(|| Arc::new(AddressCache::new()));

impl AddressCache {
    /// Create an empty cache. Most callers want [`AddressCache::shared`].
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache instance, created on first use.
    pub fn shared() -> Arc<AddressCache> {
        Arc::clone(&SHARED)
    }

    /// Look up a resolved address by cache key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Store a resolved address.
    pub fn insert(&self, key: String, address: String) {
        self.entries.lock().unwrap().insert(key, address);
    }

    /// Check whether a key has been resolved already.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
