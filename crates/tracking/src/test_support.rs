use crate::{ClickAttributor, ProfileDefaults, UserProfileStore};
use affiliate_core::config::TrackingConfig;
use affiliate_core::types::Offer;
use affiliate_core::{keys, AffiliateError, AffiliateResult};
use affiliate_store::{KeyValueStore, MemoryStore, PutOptions, RecordStore};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Memory store that rejects writes to keys with any of the given prefixes.
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_prefixes: Vec<&'static str>,
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> AffiliateResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String, opts: PutOptions) -> AffiliateResult<()> {
        if self.fail_prefixes.iter().any(|p| key.starts_with(p)) {
            return Err(AffiliateError::store(format!("write rejected for {key}")));
        }
        self.inner.put(key, value, opts).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Memory store that remembers the options each key was last written with.
#[derive(Default)]
pub struct CapturingStore {
    pub inner: MemoryStore,
    pub options: Mutex<Vec<(String, PutOptions)>>,
}

impl CapturingStore {
    pub fn options_for(&self, key: &str) -> Option<PutOptions> {
        self.options
            .lock()
            .expect("options lock")
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, opts)| *opts)
    }
}

#[async_trait]
impl KeyValueStore for CapturingStore {
    async fn get(&self, key: &str) -> AffiliateResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String, opts: PutOptions) -> AffiliateResult<()> {
        self.options
            .lock()
            .expect("options lock")
            .push((key.to_string(), opts));
        self.inner.put(key, value, opts).await
    }

    fn backend_name(&self) -> &'static str {
        "capturing"
    }
}

pub fn attributor_with(
    store: Arc<dyn KeyValueStore>,
    config: TrackingConfig,
) -> (ClickAttributor, RecordStore) {
    let records = RecordStore::new(store);
    let profiles = UserProfileStore::new(records.clone(), ProfileDefaults::default());
    (ClickAttributor::new(records.clone(), profiles, config), records)
}

pub fn attributor_over(store: Arc<dyn KeyValueStore>) -> (ClickAttributor, RecordStore) {
    attributor_with(store, TrackingConfig::default())
}

pub fn attributor() -> (ClickAttributor, RecordStore) {
    attributor_over(Arc::new(MemoryStore::new()))
}

pub fn offer(id: &str, category: &str) -> Offer {
    Offer {
        id: id.to_string(),
        network: "sample".to_string(),
        name: format!("Offer {id}"),
        description: None,
        category: Some(category.to_string()),
        commission: "5%".to_string(),
        tracking_url: format!("https://shop.example/{id}"),
        image_url: None,
        merchant: None,
        target_geo: vec!["IN".to_string()],
        cpc: 3.0,
        cps: 50.0,
        expires_at: None,
    }
}

pub async fn seed_feed(records: &RecordStore, offers: &[Offer]) {
    records
        .put(keys::OFFER_FEED, offers)
        .await
        .expect("seed offer feed");
}
