//! Per-offer performance counters.
//!
//! Each update reads the current record, mutates it and writes it back. Two
//! concurrent updates of the same offer can both read the same prior value, in
//! which case one increment is lost. The store offers no atomic increment.

use affiliate_core::keys;
use affiliate_core::types::OfferStats;
use affiliate_core::AffiliateResult;
use affiliate_store::RecordStore;
use chrono::Utc;
use tracing::debug;

#[derive(Clone)]
pub struct OfferStatsAggregator {
    records: RecordStore,
}

impl OfferStatsAggregator {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }

    pub async fn get(&self, offer_id: &str) -> AffiliateResult<Option<OfferStats>> {
        self.records.get(&keys::offer_stats(offer_id)).await
    }

    pub async fn record_click(&self, offer_id: &str) -> AffiliateResult<OfferStats> {
        self.update(offer_id, |stats| stats.clicks += 1).await
    }

    pub async fn record_sale(&self, offer_id: &str, commission: f64) -> AffiliateResult<OfferStats> {
        self.update(offer_id, |stats| {
            stats.sales += 1;
            stats.revenue += commission;
        })
        .await
    }

    async fn update<F>(&self, offer_id: &str, apply: F) -> AffiliateResult<OfferStats>
    where
        F: FnOnce(&mut OfferStats) + Send,
    {
        let key = keys::offer_stats(offer_id);
        let now = Utc::now();
        let mut stats = self
            .records
            .get::<OfferStats>(&key)
            .await?
            .unwrap_or_else(|| OfferStats::empty(now));

        apply(&mut stats);
        stats.last_updated = Some(now);
        self.records.put(&key, &stats).await?;

        debug!(
            offer_id = offer_id,
            clicks = stats.clicks,
            sales = stats.sales,
            "Offer stats updated"
        );
        Ok(stats)
    }
}
