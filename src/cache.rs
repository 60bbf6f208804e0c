//! Search-result cache.
//!
//! The [`SearchCache`] trait is the seam between the catalog service and
//! whatever holds cached result sets. The shipped backend is
//! [`MemoryCache`], a process-wide map with per-entry expiry; tests
//! substitute fakes (including failing ones) through the same trait.
//!
//! The cache is never a source of truth: every entry is reconstructible
//! from the catalog store, and the whole cache may be dropped at any
//! time. Callers are expected to treat every error here as a miss.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SearchHit;

/// Abstract cache of enriched search result sets, keyed by normalized
/// query key.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](SearchCache::get) | Fetch a live entry, `None` on miss or expiry |
/// | [`put`](SearchCache::put) | Overwrite an entry unconditionally, resetting its TTL |
/// | [`invalidate_all`](SearchCache::invalidate_all) | Drop every entry regardless of key or expiry |
///
/// Full-sweep invalidation is the only invalidation primitive: a new
/// document can match arbitrarily many cached filter combinations, and
/// the set of live keys is unbounded and untracked, so per-key purging
/// would cost at least as much as recomputation.
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<SearchHit>>>;

    async fn put(&self, key: &str, hits: &[SearchHit], ttl: Duration) -> Result<()>;

    async fn invalidate_all(&self) -> Result<()>;
}

struct Entry {
    hits: Vec<SearchHit>,
    expires_at: Instant,
}

/// In-process [`SearchCache`] backend.
///
/// Expiry is evaluated lazily at read time; there is no background
/// sweep. Concurrent `put`s to the same key race last-write-wins, which
/// is acceptable because cached values are always reconstructible.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (possibly expired, not yet collected) entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<SearchHit>>> {
        let entries = self.entries.read().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.hits.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, hits: &[SearchHit], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                hits: hits.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.clear();
        Ok(())
    }
}
