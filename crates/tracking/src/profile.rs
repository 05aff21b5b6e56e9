//! Per-user behavioral profiles, created lazily and updated read-modify-write.

use affiliate_core::config::{PersonalizationConfig, TrackingConfig};
use affiliate_core::keys;
use affiliate_core::types::UserProfile;
use affiliate_core::AffiliateResult;
use affiliate_store::RecordStore;
use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info};

/// Values given to newly created profiles.
#[derive(Debug, Clone)]
pub struct ProfileDefaults {
    pub geo: String,
    /// Seed favorites for profiles created by a read (cold start).
    pub favorite_categories: Vec<String>,
}

impl ProfileDefaults {
    pub fn from_config(tracking: &TrackingConfig, personalization: &PersonalizationConfig) -> Self {
        Self {
            geo: tracking.default_geo.clone(),
            favorite_categories: personalization.default_favorite_categories.clone(),
        }
    }
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self::from_config(&TrackingConfig::default(), &PersonalizationConfig::default())
    }
}

#[derive(Clone)]
pub struct UserProfileStore {
    records: RecordStore,
    defaults: ProfileDefaults,
}

impl UserProfileStore {
    pub fn new(records: RecordStore, defaults: ProfileDefaults) -> Self {
        Self { records, defaults }
    }

    pub async fn get(&self, user_id: &str) -> AffiliateResult<Option<UserProfile>> {
        let profile = self
            .records
            .get::<UserProfile>(&keys::user_profile(user_id))
            .await?;
        Ok(profile.map(|p| with_user_id(p, user_id)))
    }

    /// Return the stored profile, creating and persisting a cold-start profile
    /// seeded with the default favorites when none exists.
    pub async fn get_or_create(&self, user_id: &str) -> AffiliateResult<UserProfile> {
        if let Some(profile) = self.get(user_id).await? {
            return Ok(profile);
        }

        let profile = self.fresh(user_id, self.defaults.favorite_categories.clone(), Utc::now());
        self.save(&profile).await?;
        info!(user_id = user_id, "Created default user profile");
        Ok(profile)
    }

    /// Count a click. Profiles first seen here start with no favorites, so the
    /// clicked category becomes the first one.
    pub async fn record_click(
        &self,
        user_id: &str,
        category: Option<&str>,
    ) -> AffiliateResult<UserProfile> {
        let now = Utc::now();
        let mut profile = self
            .get(user_id)
            .await?
            .unwrap_or_else(|| self.fresh(user_id, Vec::new(), now));

        profile.record_click(category, now);
        self.save(&profile).await?;
        debug!(
            user_id = user_id,
            category = category.unwrap_or(""),
            total_clicks = profile.total_clicks,
            "Profile click recorded"
        );
        Ok(profile)
    }

    pub async fn record_conversion(
        &self,
        user_id: &str,
        commission: f64,
    ) -> AffiliateResult<UserProfile> {
        let now = Utc::now();
        let mut profile = self
            .get(user_id)
            .await?
            .unwrap_or_else(|| self.fresh(user_id, Vec::new(), now));

        profile.record_conversion(commission, now);
        self.save(&profile).await?;
        Ok(profile)
    }

    pub async fn save(&self, profile: &UserProfile) -> AffiliateResult<()> {
        self.records
            .put(&keys::user_profile(&profile.user_id), profile)
            .await
    }

    fn fresh(&self, user_id: &str, favorites: Vec<String>, now: DateTime<Utc>) -> UserProfile {
        UserProfile::new(user_id, &self.defaults.geo, now.hour(), favorites, now)
    }
}

/// Older records may lack the id field.
fn with_user_id(mut profile: UserProfile, user_id: &str) -> UserProfile {
    if profile.user_id.is_empty() {
        profile.user_id = user_id.to_string();
    }
    profile
}
