//! Daily revenue rollups, one record per UTC calendar day.

use affiliate_core::keys;
use affiliate_core::types::{AffiliateNetwork, DailyMetrics};
use affiliate_core::AffiliateResult;
use affiliate_store::RecordStore;
use chrono::NaiveDate;

#[derive(Clone)]
pub struct DailyMetricsLedger {
    records: RecordStore,
}

impl DailyMetricsLedger {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }

    pub async fn get(&self, date: NaiveDate) -> AffiliateResult<Option<DailyMetrics>> {
        self.records.get(&keys::daily_metrics(date)).await
    }

    pub async fn record_sale(
        &self,
        date: NaiveDate,
        network: AffiliateNetwork,
        commission: f64,
    ) -> AffiliateResult<DailyMetrics> {
        let key = keys::daily_metrics(date);
        let mut metrics = self
            .records
            .get::<DailyMetrics>(&key)
            .await?
            .unwrap_or_else(|| DailyMetrics::new(date));

        metrics.record_sale(network, commission);
        self.records.put(&key, &metrics).await?;
        Ok(metrics)
    }
}
