//! Redis-backed store. Keys are optionally namespaced with a prefix so several
//! deployments can share one Redis instance.

use crate::{KeyValueStore, PutOptions};
use affiliate_core::config::StoreConfig;
use affiliate_core::{AffiliateError, AffiliateResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Connect to Redis and verify connectivity with a PING. The connection
    /// manager reconnects on its own after the initial connect.
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        info!(url = %config.redis_url, "Connecting to Redis");

        let client = redis::Client::open(config.redis_url.as_str())?;
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let mut conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("Redis connect timed out after {timeout:?}"))??;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> AffiliateResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(self.key(key))
            .await
            .map_err(AffiliateError::store)
    }

    async fn put(&self, key: &str, value: String, opts: PutOptions) -> AffiliateResult<()> {
        let mut conn = self.conn.clone();
        let key = self.key(key);
        match opts.ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(&key, value, ttl.as_secs().max(1))
                .await
                .map_err(AffiliateError::store),
            None => conn
                .set::<_, _, ()>(&key, value)
                .await
                .map_err(AffiliateError::store),
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
