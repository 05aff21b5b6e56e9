//! Per-user re-scoring of the global ranking.
//!
//! Each ranked offer gets a linear blend of the user's category affinity, the
//! offer's conversion rate and three binary context signals, squashed through a
//! sigmoid so scores stay in (0, 1).

use affiliate_core::types::{PersonalizedOffer, RankedOffer, UserProfile};
use affiliate_core::{keys, AffiliateError, AffiliateResult};
use affiliate_store::RecordStore;
use affiliate_tracking::{Bookkeeping, Step, UserProfileStore};
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

const USER_CTR_WEIGHT: f64 = 0.35;
const OFFER_CVR_WEIGHT: f64 = 0.25;
const PREF_MATCH_WEIGHT: f64 = 0.20;
const GEO_WEIGHT: f64 = 0.10;
const TIME_WEIGHT: f64 = 0.10;

/// Steepness applied to the linear score before the sigmoid.
const SIGMOID_GAIN: f64 = 10.0;

/// Category CTR assumed when the user has no clicks in the category.
const DEFAULT_USER_CTR: f64 = 0.02;
/// Conversion rate assumed for offers that have not converted yet.
const DEFAULT_OFFER_CVR: f64 = 0.01;
/// Hours either side of the user's active hour counted as "active now".
const ACTIVE_HOUR_WINDOW: i64 = 3;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Share of the user's clicks that landed in `category`, capped at 1.
fn user_ctr(profile: &UserProfile, category: Option<&str>) -> f64 {
    let clicks = category
        .and_then(|c| profile.ctr_history.get(c))
        .copied()
        .unwrap_or(0);
    if clicks == 0 || profile.total_clicks == 0 {
        return DEFAULT_USER_CTR;
    }
    (clicks as f64 / profile.total_clicks as f64).min(1.0)
}

fn offer_cvr(ranked: &RankedOffer) -> f64 {
    if ranked.cvr.is_finite() && ranked.cvr != 0.0 {
        ranked.cvr
    } else {
        DEFAULT_OFFER_CVR
    }
}

/// Plain absolute difference; 23 and 0 are 23 hours apart.
fn is_active_hour(active_hour: u32, current_hour: u32) -> bool {
    (i64::from(active_hour) - i64::from(current_hour)).abs() < ACTIVE_HOUR_WINDOW
}

/// Re-score `ranked` for one user, best first. Ties keep the global order.
pub fn personalize(
    ranked: Vec<RankedOffer>,
    profile: &UserProfile,
    current_hour: u32,
) -> Vec<PersonalizedOffer> {
    let time_score = u8::from(is_active_hour(profile.active_hour, current_hour));

    let mut offers: Vec<PersonalizedOffer> = ranked
        .into_iter()
        .map(|ranked| {
            let category = ranked.offer.category();
            let pref_match = u8::from(
                category.is_some_and(|c| profile.favorite_cats.iter().any(|f| f == c)),
            );
            let geo_weight = u8::from(ranked.offer.target_geo.contains(&profile.geo));
            let user_ctr = user_ctr(profile, category);

            let linear = USER_CTR_WEIGHT * user_ctr
                + OFFER_CVR_WEIGHT * offer_cvr(&ranked)
                + PREF_MATCH_WEIGHT * f64::from(pref_match)
                + GEO_WEIGHT * f64::from(geo_weight)
                + TIME_WEIGHT * f64::from(time_score);

            PersonalizedOffer {
                personalized_score: sigmoid(SIGMOID_GAIN * linear),
                user_ctr,
                pref_match,
                geo_weight,
                time_score,
                ranked,
            }
        })
        .collect();

    offers.sort_by(|a, b| b.personalized_score.total_cmp(&a.personalized_score));
    offers
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub favorite_cats: Vec<String>,
    pub total_clicks: u64,
    pub total_sales: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedFeed {
    pub offers: Vec<PersonalizedOffer>,
    pub user: UserSummary,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub bookkeeping: Bookkeeping,
}

#[derive(Clone)]
pub struct PersonalizationEngine {
    records: RecordStore,
    profiles: UserProfileStore,
}

impl PersonalizationEngine {
    pub fn new(records: RecordStore, profiles: UserProfileStore) -> Self {
        Self { records, profiles }
    }

    /// Personalize the current global ranking for `user_id` and cache the result
    /// under `offers_ranked_<user_id>`.
    ///
    /// Fails with `NotFound` until ranking has run once. Unknown users get a
    /// cold-start profile. A failed cache write is reported in `bookkeeping`.
    pub async fn personalize_for(&self, user_id: &str) -> AffiliateResult<PersonalizedFeed> {
        let ranked: Vec<RankedOffer> = self
            .records
            .get(keys::OFFER_FEED_RANKED)
            .await?
            .ok_or_else(|| AffiliateError::not_found("No ranked offers found. Run ranking first."))?;

        let profile = self.profiles.get_or_create(user_id).await?;
        let now = Utc::now();
        let offers = personalize(ranked, &profile, now.hour());

        let mut bookkeeping = Bookkeeping::default();
        bookkeeping.record(
            Step::PersonalizedCache,
            self.records
                .put(&keys::personalized_feed(user_id), &offers)
                .await,
        );

        info!(
            user_id = user_id,
            count = offers.len(),
            top_score = offers.first().map(|o| o.personalized_score).unwrap_or_default(),
            "Offers personalized"
        );

        Ok(PersonalizedFeed {
            offers,
            user: UserSummary {
                id: user_id.to_string(),
                favorite_cats: profile.favorite_cats,
                total_clicks: profile.total_clicks,
                total_sales: profile.total_sales,
            },
            updated_at: now,
            bookkeeping,
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use affiliate_core::types::{Offer, OfferStats};
    use affiliate_store::{KeyValueStore, MemoryStore, PutOptions};
    use affiliate_tracking::{ProfileDefaults, StepStatus};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn ranked(id: &str, category: &str, geo: &str, cvr: f64) -> RankedOffer {
        RankedOffer {
            offer: Offer {
                id: id.to_string(),
                network: "sample".to_string(),
                name: format!("Offer {id}"),
                description: None,
                category: Some(category.to_string()),
                commission: "5%".to_string(),
                tracking_url: format!("https://shop.example/{id}"),
                image_url: None,
                merchant: None,
                target_geo: vec![geo.to_string()],
                cpc: 1.0,
                cps: 10.0,
                expires_at: None,
            },
            ctr: 0.0,
            cvr,
            epc: 0.0,
            score: 0.0,
            stats: OfferStats::unseen(),
        }
    }

    fn profile(favorites: &[&str], active_hour: u32) -> UserProfile {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        UserProfile::new(
            "u1",
            "IN",
            active_hour,
            favorites.iter().map(|s| s.to_string()).collect(),
            now,
        )
    }

    #[test]
    fn test_sigmoid_is_bounded() {
        for x in [-50.0, -1.0, 0.0, 0.3, 1.0, 30.0] {
            let y = sigmoid(x);
            assert!(y > 0.0 && y < 1.0, "sigmoid({x}) = {y}");
        }
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_preference_match_follows_favorites() {
        let user = profile(&["electronics"], 10);
        let offers = personalize(
            vec![ranked("a", "fashion", "IN", 0.0), ranked("b", "electronics", "IN", 0.0)],
            &user,
            10,
        );
        assert_eq!(offers[0].ranked.offer.id, "b");
        assert_eq!(offers[0].pref_match, 1);
        assert_eq!(offers[1].pref_match, 0);
    }

    #[test]
    fn test_time_window_is_not_circular() {
        let user = profile(&[], 10);
        let at = |hour| personalize(vec![ranked("a", "x", "IN", 0.0)], &user, hour)[0].time_score;
        assert_eq!(at(12), 1);
        assert_eq!(at(8), 1);
        assert_eq!(at(13), 0);
        assert_eq!(at(14), 0);

        let late = profile(&[], 23);
        assert_eq!(personalize(vec![ranked("a", "x", "IN", 0.0)], &late, 0)[0].time_score, 0);
    }

    #[test]
    fn test_defaults_for_unseen_category_and_unconverted_offer() {
        let user = profile(&[], 0);
        let offer = &personalize(vec![ranked("a", "books", "US", 0.0)], &user, 12)[0];
        assert_eq!(offer.user_ctr, 0.02);
        assert_eq!(offer.geo_weight, 0);
        assert_eq!(offer.time_score, 0);
        let expected = sigmoid(10.0 * (0.35 * 0.02 + 0.25 * 0.01));
        assert!((offer.personalized_score - expected).abs() < 1e-12);

        let nan = &personalize(vec![ranked("a", "books", "US", f64::NAN)], &user, 12)[0];
        assert!((nan.personalized_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_user_ctr_from_click_history() {
        let mut user = profile(&["electronics"], 10);
        user.ctr_history = BTreeMap::from([("electronics".to_string(), 3), ("fashion".to_string(), 1)]);
        user.total_clicks = 4;

        let offers = personalize(
            vec![ranked("f", "fashion", "IN", 0.1), ranked("e", "electronics", "IN", 0.1)],
            &user,
            10,
        );
        assert_eq!(offers[0].ranked.offer.id, "e");
        assert!((offers[0].user_ctr - 0.75).abs() < 1e-12);
        assert!((offers[1].user_ctr - 0.25).abs() < 1e-12);
        assert!(offers.windows(2).all(|w| w[0].personalized_score >= w[1].personalized_score));
    }

    #[test]
    fn test_equal_scores_keep_global_order() {
        let user = profile(&[], 10);
        let offers = personalize(
            vec![
                ranked("first", "x", "IN", 0.0),
                ranked("second", "x", "IN", 0.0),
                ranked("third", "x", "IN", 0.0),
            ],
            &user,
            10,
        );
        let ids: Vec<&str> = offers.iter().map(|o| o.ranked.offer.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    fn engine_over(store: Arc<dyn KeyValueStore>) -> (PersonalizationEngine, RecordStore) {
        let records = RecordStore::new(store);
        let profiles = UserProfileStore::new(records.clone(), ProfileDefaults::default());
        (PersonalizationEngine::new(records.clone(), profiles), records)
    }

    #[tokio::test]
    async fn test_requires_ranking_first() {
        let backing = Arc::new(MemoryStore::new());
        let (engine, _) = engine_over(backing.clone());
        assert!(matches!(
            engine.personalize_for("u1").await,
            Err(AffiliateError::NotFound(_))
        ));
        assert!(backing.is_empty());
    }

    #[tokio::test]
    async fn test_personalize_for_new_user_caches_result() {
        let (engine, records) = engine_over(Arc::new(MemoryStore::new()));
        records
            .put(
                keys::OFFER_FEED_RANKED,
                &vec![ranked("a", "fashion", "IN", 0.0), ranked("b", "education", "Global", 0.0)],
            )
            .await
            .unwrap();

        let feed = engine.personalize_for("new-user").await.unwrap();
        assert!(feed.bookkeeping.is_clean());
        assert_eq!(feed.user.id, "new-user");
        assert_eq!(feed.user.favorite_cats, vec!["shopping", "electronics", "education"]);
        assert_eq!(feed.user.total_clicks, 0);
        assert_eq!(feed.offers[0].ranked.offer.id, "b");

        let cached: Vec<PersonalizedOffer> = records
            .get(&keys::personalized_feed("new-user"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, feed.offers);
        let stored: UserProfile = records.get("user_new-user").await.unwrap().unwrap();
        assert_eq!(stored.geo, "IN");
    }

    struct NoCacheStore(MemoryStore);

    #[async_trait]
    impl KeyValueStore for NoCacheStore {
        async fn get(&self, key: &str) -> AffiliateResult<Option<String>> {
            self.0.get(key).await
        }

        async fn put(&self, key: &str, value: String, opts: PutOptions) -> AffiliateResult<()> {
            if key.starts_with("offers_ranked_") {
                return Err(AffiliateError::store("cache unavailable"));
            }
            self.0.put(key, value, opts).await
        }

        fn backend_name(&self) -> &'static str {
            "no-cache"
        }
    }

    #[tokio::test]
    async fn test_cache_failure_is_not_surfaced() {
        let (engine, records) = engine_over(Arc::new(NoCacheStore(MemoryStore::new())));
        records
            .put(keys::OFFER_FEED_RANKED, &vec![ranked("a", "fashion", "IN", 0.0)])
            .await
            .unwrap();

        let feed = engine.personalize_for("u1").await.unwrap();
        assert_eq!(feed.offers.len(), 1);
        assert!(matches!(
            feed.bookkeeping.status(Step::PersonalizedCache),
            Some(StepStatus::Failed(_))
        ));
    }
}
