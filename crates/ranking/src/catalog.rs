//! The offer feed: the current set of offers, replaced wholesale on refresh.

use affiliate_core::config::CatalogConfig;
use affiliate_core::types::Offer;
use affiliate_core::{keys, AffiliateError, AffiliateResult};
use affiliate_store::RecordStore;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use utoipa::ToSchema;

/// Where a refresh took its offers from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    File,
    Samples,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRefresh {
    pub count: usize,
    pub source: FeedSource,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OfferCatalog {
    records: RecordStore,
    feed_path: Option<PathBuf>,
}

impl OfferCatalog {
    pub fn new(records: RecordStore, config: &CatalogConfig) -> Self {
        Self {
            records,
            feed_path: config.feed_path.as_ref().map(PathBuf::from),
        }
    }

    /// Reload the feed and overwrite `offer_feed`.
    ///
    /// A configured feed file that cannot be read or parsed fails the refresh and
    /// leaves the stored feed untouched. A file holding no offers falls back to
    /// the built-in samples.
    pub async fn refresh(&self) -> AffiliateResult<CatalogRefresh> {
        let (offers, source) = match &self.feed_path {
            Some(path) => {
                let offers = load_feed_file(path).await?;
                if offers.is_empty() {
                    warn!(path = %path.display(), "Offer feed file is empty, using sample offers");
                    (sample_offers(), FeedSource::Samples)
                } else {
                    (offers, FeedSource::File)
                }
            }
            None => (sample_offers(), FeedSource::Samples),
        };

        let now = Utc::now();
        self.records.put(keys::OFFER_FEED, &offers).await?;
        self.records
            .put_raw(
                keys::FEED_UPDATED_AT,
                now.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .await?;

        metrics::counter!("catalog.refreshes").increment(1);
        info!(count = offers.len(), source = ?source, "Offer feed refreshed");

        Ok(CatalogRefresh {
            count: offers.len(),
            source,
            updated_at: now,
        })
    }

    pub async fn current(&self) -> AffiliateResult<Vec<Offer>> {
        self.records
            .get(keys::OFFER_FEED)
            .await?
            .ok_or_else(|| AffiliateError::not_found("No offers found"))
    }

    /// When the feed was last refreshed, as stored.
    pub async fn last_updated(&self) -> AffiliateResult<Option<String>> {
        self.records.get_raw(keys::FEED_UPDATED_AT).await
    }
}

async fn load_feed_file(path: &Path) -> AffiliateResult<Vec<Offer>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading offer feed {}", path.display()))?;
    let offers: Vec<Offer> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing offer feed {}", path.display()))?;
    Ok(offers)
}

/// Offers published when no feed source yields any.
pub fn sample_offers() -> Vec<Offer> {
    vec![
        Offer {
            id: "sample_amazon_electronics".to_string(),
            network: "sample".to_string(),
            name: "Amazon Electronics Mega Sale".to_string(),
            description: Some("Up to 70% off on electronics, smartphones, laptops".to_string()),
            category: Some("electronics".to_string()),
            commission: "2-8%".to_string(),
            tracking_url: "https://amazon.in/electronics".to_string(),
            image_url: Some("https://via.placeholder.com/200x150?text=Amazon+Electronics".to_string()),
            merchant: Some("Amazon India".to_string()),
            target_geo: vec!["IN".to_string()],
            cpc: 5.0,
            cps: 100.0,
            expires_at: None,
        },
        Offer {
            id: "sample_udemy_courses".to_string(),
            network: "sample".to_string(),
            name: "Udemy Skill Development Courses".to_string(),
            description: Some("Learn new skills with 90% off courses".to_string()),
            category: Some("education".to_string()),
            commission: "15-50%".to_string(),
            tracking_url: "https://udemy.com/courses".to_string(),
            image_url: Some("https://via.placeholder.com/200x150?text=Udemy+Courses".to_string()),
            merchant: Some("Udemy".to_string()),
            target_geo: vec!["Global".to_string()],
            cpc: 3.0,
            cps: 75.0,
            expires_at: None,
        },
        Offer {
            id: "sample_flipkart_fashion".to_string(),
            network: "sample".to_string(),
            name: "Flipkart Fashion Week".to_string(),
            description: Some("Trendy fashion at unbeatable prices".to_string()),
            category: Some("fashion".to_string()),
            commission: "3-12%".to_string(),
            tracking_url: "https://flipkart.com/fashion".to_string(),
            image_url: Some("https://via.placeholder.com/200x150?text=Flipkart+Fashion".to_string()),
            merchant: Some("Flipkart".to_string()),
            target_geo: vec!["IN".to_string()],
            cpc: 2.0,
            cps: 40.0,
            expires_at: None,
        },
    ]
}
