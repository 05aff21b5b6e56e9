//! In-process store backed by DashMap for lock-free concurrent access.
//! Used for development, single-node deployments and tests.

use crate::{KeyValueStore, PutOptions};
use affiliate_core::AffiliateResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Instant;
use tracing::debug;

struct StoreEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoreEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries. Called periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AffiliateResult<Option<String>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(Instant::now()) {
            drop(entry);
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn put(&self, key: &str, value: String, opts: PutOptions) -> AffiliateResult<()> {
        let expires_at = opts.ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), StoreEntry { value, expires_at });
        Ok(())
    }

    async fn maintenance(&self) {
        let evicted = self.evict_expired();
        if evicted > 0 {
            metrics::counter!("store.memory.expired").increment(evicted as u64);
            debug!(evicted = evicted, "Memory store eviction complete");
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
