//! Click tracking and redirect construction.

use crate::classify::detect_device;
use crate::daily::DailyMetricsLedger;
use crate::outcome::{Bookkeeping, Step};
use crate::profile::UserProfileStore;
use crate::stats::OfferStatsAggregator;
use affiliate_core::config::TrackingConfig;
use affiliate_core::types::{ClickRecord, Offer};
use affiliate_core::{keys, AffiliateError, AffiliateResult};
use affiliate_store::{PutOptions, RecordStore};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const CLICK_ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Inputs to [`ClickAttributor::record_click`], as extracted from the HTTP request.
#[derive(Debug, Clone, Default)]
pub struct ClickRequest {
    pub offer_url: Option<String>,
    pub user_id: Option<String>,
    pub offer_id: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub ip: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClickOutcome {
    pub click_id: String,
    pub redirect_url: String,
    pub record: ClickRecord,
    pub bookkeeping: Bookkeeping,
}

/// Records clicks and attributes later sale callbacks back to them.
#[derive(Clone)]
pub struct ClickAttributor {
    pub(crate) records: RecordStore,
    pub(crate) stats: OfferStatsAggregator,
    pub(crate) profiles: UserProfileStore,
    pub(crate) daily: DailyMetricsLedger,
    pub(crate) config: TrackingConfig,
}

impl ClickAttributor {
    pub fn new(records: RecordStore, profiles: UserProfileStore, config: TrackingConfig) -> Self {
        Self {
            stats: OfferStatsAggregator::new(records.clone()),
            daily: DailyMetricsLedger::new(records.clone()),
            records,
            profiles,
            config,
        }
    }

    pub fn stats(&self) -> &OfferStatsAggregator {
        &self.stats
    }

    pub fn daily(&self) -> &DailyMetricsLedger {
        &self.daily
    }

    /// Record a click and build the redirect to the offer.
    ///
    /// Input is validated before anything is written. Once the click record is
    /// stored the call succeeds; the stats and profile updates that follow are
    /// independent best-effort writes reported through `bookkeeping`.
    pub async fn record_click(&self, request: ClickRequest) -> AffiliateResult<ClickOutcome> {
        let offer_url = non_empty(request.offer_url.as_deref())
            .ok_or_else(|| AffiliateError::validation("Missing required parameter: offer_url"))?;
        let user_id = non_empty(request.user_id.as_deref())
            .ok_or_else(|| AffiliateError::validation("Missing required parameter: user_id"))?;
        let mut redirect = parse_offer_url(offer_url)?;
        let offer_id = non_empty(request.offer_id.as_deref()).map(str::to_string);

        let now = Utc::now();
        let click_id = generate_click_id(now);
        let record = ClickRecord {
            click_id: click_id.clone(),
            user_id: user_id.to_string(),
            offer_id: offer_id.clone(),
            offer_url: offer_url.to_string(),
            timestamp: now,
            device: detect_device(request.user_agent.as_deref()),
            user_agent: request.user_agent,
            referer: request.referer,
            ip: request.ip,
            country: request.country,
        };

        self.records
            .put_with(&keys::click(&click_id), &record, self.click_put_options())
            .await?;
        metrics::counter!("clicks.recorded").increment(1);

        let mut bookkeeping = Bookkeeping::default();
        let mut category = None;
        match &offer_id {
            Some(offer_id) => {
                bookkeeping.record(Step::OfferClickStats, self.stats.record_click(offer_id).await);
                match self.find_offer(offer_id).await {
                    Ok(Some(offer)) => {
                        category = offer.category().map(str::to_string);
                        bookkeeping.record(Step::OfferLookup, Ok(()));
                    }
                    Ok(None) => bookkeeping.skip(Step::OfferLookup, "offer not in current feed"),
                    Err(e) => bookkeeping.record::<()>(Step::OfferLookup, Err(e)),
                }
            }
            None => {
                bookkeeping.skip(Step::OfferClickStats, "no offer id");
                bookkeeping.skip(Step::OfferLookup, "no offer id");
            }
        }
        bookkeeping.record(
            Step::ProfileClick,
            self.profiles.record_click(user_id, category.as_deref()).await,
        );

        append_tracking_params(&mut redirect, &click_id, &self.config.source_tag);

        info!(
            click_id = %click_id,
            user_id = user_id,
            offer_id = offer_id.as_deref().unwrap_or("unknown"),
            device = ?record.device,
            "Click recorded"
        );

        Ok(ClickOutcome {
            click_id,
            redirect_url: redirect.to_string(),
            record,
            bookkeeping,
        })
    }

    fn click_put_options(&self) -> PutOptions {
        match self.config.click_ttl_secs.filter(|secs| *secs > 0) {
            Some(secs) => PutOptions::with_ttl(Duration::from_secs(secs)),
            None => PutOptions::default(),
        }
    }

    /// Look an offer up in the current feed. The category seen here is what the
    /// profile keeps, even if the offer is recategorized later.
    async fn find_offer(&self, offer_id: &str) -> AffiliateResult<Option<Offer>> {
        let feed = self
            .records
            .get::<Vec<Offer>>(keys::OFFER_FEED)
            .await?
            .unwrap_or_default();
        let offer = feed.into_iter().find(|o| o.id == offer_id);
        if offer.is_none() {
            debug!(offer_id = offer_id, "Clicked offer not found in feed");
        }
        Ok(offer)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_offer_url(raw: &str) -> AffiliateResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AffiliateError::validation(format!("offer_url is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AffiliateError::validation(format!(
            "offer_url scheme '{other}' is not allowed"
        ))),
    }
}

/// `click_<unix millis>_<9 base36 chars>`. Unique in practice, not guaranteed.
pub fn generate_click_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CLICK_ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("click_{}_{suffix}", now.timestamp_millis())
}

/// Set `click_id` and `source` on the redirect, replacing any existing values.
fn append_tracking_params(url: &mut Url, click_id: &str, source: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "click_id" && k != "source")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("click_id", click_id)
        .append_pair("source", source);
}
