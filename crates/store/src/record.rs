//! Typed JSON records on top of a raw [`KeyValueStore`].

use crate::{KeyValueStore, PutOptions};
use affiliate_core::AffiliateResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Cheaply cloneable handle shared by every component that reads or writes records.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<dyn KeyValueStore>,
}

impl RecordStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Read and decode a record. Malformed JSON is an error, not a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AffiliateResult<Option<T>> {
        match self.inner.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AffiliateResult<()> {
        self.put_with(key, value, PutOptions::default()).await
    }

    pub async fn put_with<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        opts: PutOptions,
    ) -> AffiliateResult<()> {
        let json = serde_json::to_string(value)?;
        self.inner.put(key, json, opts).await
    }

    /// Raw string access for values that are stored verbatim.
    pub async fn get_raw(&self, key: &str) -> AffiliateResult<Option<String>> {
        self.inner.get(key).await
    }

    pub async fn put_raw(&self, key: &str, value: String) -> AffiliateResult<()> {
        self.inner.put(key, value, PutOptions::default()).await
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner
    }
}
