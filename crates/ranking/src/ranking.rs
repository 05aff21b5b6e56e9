//! Global offer ranking from observed click and sale performance.

use crate::catalog::OfferCatalog;
use affiliate_core::types::{Offer, OfferStats, RankedOffer};
use affiliate_core::{keys, AffiliateError, AffiliateResult};
use affiliate_store::RecordStore;
use affiliate_tracking::OfferStatsAggregator;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};
use utoipa::ToSchema;

const CTR_WEIGHT: f64 = 0.4;
const CVR_WEIGHT: f64 = 0.4;
const EPC_WEIGHT: f64 = 0.2;

/// Earnings per click at which the EPC component saturates.
const EPC_SATURATION: f64 = 100.0;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankingSummary {
    pub count: usize,
    /// Name of the best-scoring offer, `None` for an empty feed.
    pub top_offer: String,
    pub updated_at: DateTime<Utc>,
}

/// Score a single offer. Offers without stats are scored as unseen.
pub fn score_offer(offer: Offer, stats: Option<OfferStats>) -> RankedOffer {
    let stats = stats.unwrap_or_else(OfferStats::unseen);
    let (ctr, cvr, epc) = (stats.ctr(), stats.cvr(), stats.epc());

    let score = CTR_WEIGHT * (ctr * 100.0).min(1.0)
        + CVR_WEIGHT * (cvr * 100.0).min(1.0)
        + EPC_WEIGHT * (epc / EPC_SATURATION).min(1.0);

    RankedOffer {
        offer,
        ctr,
        cvr,
        epc,
        score,
        stats,
    }
}

/// Score every offer and order them best first. Offers with equal scores keep
/// their feed order.
pub fn rank_offers<F>(feed: Vec<Offer>, mut stats_for: F) -> Vec<RankedOffer>
where
    F: FnMut(&Offer) -> Option<OfferStats>,
{
    let mut ranked: Vec<RankedOffer> = feed
        .into_iter()
        .map(|offer| {
            let stats = stats_for(&offer);
            score_offer(offer, stats)
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Recomputes and publishes the global ranking.
#[derive(Clone)]
pub struct RankingEngine {
    records: RecordStore,
    catalog: OfferCatalog,
    stats: OfferStatsAggregator,
}

impl RankingEngine {
    pub fn new(records: RecordStore, catalog: OfferCatalog) -> Self {
        Self {
            stats: OfferStatsAggregator::new(records.clone()),
            records,
            catalog,
        }
    }

    /// Rank the current feed and overwrite `offer_feed_ranked`. Stats are read,
    /// never written.
    pub async fn run(&self) -> AffiliateResult<RankingSummary> {
        let feed = self.catalog.current().await?;

        let mut known = HashMap::with_capacity(feed.len());
        for offer in &feed {
            if let Some(stats) = self.stats.get(&offer.id).await? {
                known.insert(offer.id.clone(), stats);
            }
        }
        let ranked = rank_offers(feed, |offer| known.get(&offer.id).cloned());

        let now = Utc::now();
        self.records.put(keys::OFFER_FEED_RANKED, &ranked).await?;
        self.records
            .put_raw(
                keys::RANKING_UPDATED_AT,
                now.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .await?;

        let top_offer = ranked
            .first()
            .map(|r| r.offer.name.clone())
            .unwrap_or_else(|| "None".to_string());

        metrics::counter!("ranking.runs").increment(1);
        if let Some(top) = ranked.first() {
            debug!(offer_id = %top.offer.id, score = top.score, "Top ranked offer");
        }
        info!(count = ranked.len(), top_offer = %top_offer, "Offers ranked");

        Ok(RankingSummary {
            count: ranked.len(),
            top_offer,
            updated_at: now,
        })
    }

    /// The last published ranking.
    pub async fn ranked(&self) -> AffiliateResult<Vec<RankedOffer>> {
        self.records
            .get(keys::OFFER_FEED_RANKED)
            .await?
            .ok_or_else(|| AffiliateError::not_found("No ranked offers found. Run ranking first."))
    }

    /// When the ranking was last published, as stored.
    pub async fn updated_at(&self) -> AffiliateResult<Option<String>> {
        self.records.get_raw(keys::RANKING_UPDATED_AT).await
    }
}
