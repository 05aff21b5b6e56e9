//! Key-value storage for affiliate records.
//!
//! The store is deliberately minimal: string get and put, no transactions and no
//! atomic increment. Every aggregate update elsewhere in the workspace is a
//! read-modify-write over this interface, so concurrent writers can lose updates.

#![warn(clippy::unwrap_used)]

pub mod memory;
pub mod record;
pub mod redis_store;

pub use memory::MemoryStore;
pub use record::RecordStore;
pub use redis_store::RedisStore;

use affiliate_core::AffiliateResult;
use async_trait::async_trait;
use std::time::Duration;

/// Options accepted by [`KeyValueStore::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Expire the key after this long. `None` keeps it indefinitely.
    pub ttl: Option<Duration>,
}

impl PutOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AffiliateResult<Option<String>>;

    async fn put(&self, key: &str, value: String, opts: PutOptions) -> AffiliateResult<()>;

    /// Periodic housekeeping. Backends with server-side expiry do nothing.
    async fn maintenance(&self) {}

    fn backend_name(&self) -> &'static str;
}
