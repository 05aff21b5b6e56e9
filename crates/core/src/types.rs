use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

/// Impressions assumed for an offer that has never been clicked or sold.
/// No impression pipeline exists, so this constant drives CTR for new offers.
pub const UNSEEN_OFFER_IMPRESSIONS: u64 = 100;

/// Upper bound on `UserProfile::favorite_cats`.
pub const MAX_FAVORITE_CATEGORIES: usize = 5;

/// An affiliate offer as published in the offer feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form commission label, e.g. `2-8%`.
    #[serde(default)]
    pub commission: String,
    #[serde(default, alias = "tracking_url")]
    pub tracking_url: String,
    #[serde(default, alias = "image_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default)]
    pub target_geo: Vec<String>,
    #[serde(default)]
    pub cpc: f64,
    #[serde(default)]
    pub cps: f64,
    #[serde(default, alias = "expires_at", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl Offer {
    /// Category if present and non-empty.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}

/// Aggregated performance counters for one offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfferStats {
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub sales: u64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl OfferStats {
    /// Zeroed counters, as created on the first click or sale.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            impressions: 0,
            clicks: 0,
            sales: 0,
            revenue: 0.0,
            last_updated: Some(now),
        }
    }

    /// Stand-in used by ranking for offers with no stored stats.
    pub fn unseen() -> Self {
        Self {
            impressions: UNSEEN_OFFER_IMPRESSIONS,
            clicks: 0,
            sales: 0,
            revenue: 0.0,
            last_updated: None,
        }
    }

    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }

    pub fn cvr(&self) -> f64 {
        if self.clicks == 0 {
            0.0
        } else {
            self.sales as f64 / self.clicks as f64
        }
    }

    pub fn epc(&self) -> f64 {
        if self.clicks == 0 {
            0.0
        } else {
            self.revenue / self.clicks as f64
        }
    }
}

/// An offer with its global performance score attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RankedOffer {
    #[serde(flatten)]
    pub offer: Offer,
    #[serde(default)]
    pub ctr: f64,
    #[serde(default)]
    pub cvr: f64,
    #[serde(default)]
    pub epc: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default = "OfferStats::unseen")]
    pub stats: OfferStats,
}

/// A globally ranked offer re-scored for a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedOffer {
    #[serde(flatten)]
    pub ranked: RankedOffer,
    pub personalized_score: f64,
    #[serde(rename = "userCTR")]
    pub user_ctr: f64,
    pub pref_match: u8,
    pub geo_weight: u8,
    pub time_score: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

/// Write-once record of a tracked click. Anchor for later sale attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    pub click_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    pub offer_url: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub device: DeviceType,
}

/// Behavioral state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: String,
    /// Category -> number of clicks observed in that category.
    #[serde(default)]
    pub ctr_history: BTreeMap<String, u64>,
    #[serde(default)]
    pub favorite_cats: Vec<String>,
    #[serde(default)]
    pub geo: String,
    #[serde(default)]
    pub active_hour: u32,
    #[serde(default)]
    pub total_clicks: u64,
    #[serde(default)]
    pub total_sales: u64,
    #[serde(default)]
    pub total_earnings: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_active: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(
        user_id: &str,
        geo: &str,
        active_hour: u32,
        favorite_cats: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            ctr_history: BTreeMap::new(),
            favorite_cats,
            geo: geo.to_string(),
            active_hour,
            total_clicks: 0,
            total_sales: 0,
            total_earnings: 0.0,
            created_at: now,
            last_active: now,
        }
    }

    /// Count a click, crediting `category` when the clicked offer had one.
    ///
    /// A category is appended to the favorites only while fewer than
    /// `MAX_FAVORITE_CATEGORIES` are held; later categories are dropped.
    pub fn record_click(&mut self, category: Option<&str>, now: DateTime<Utc>) {
        self.total_clicks += 1;
        self.last_active = now;

        let Some(category) = category.filter(|c| !c.is_empty()) else {
            return;
        };
        *self.ctr_history.entry(category.to_string()).or_insert(0) += 1;
        if !self.favorite_cats.iter().any(|c| c == category) {
            self.favorite_cats.push(category.to_string());
        }
        self.favorite_cats.truncate(MAX_FAVORITE_CATEGORIES);
    }

    pub fn record_conversion(&mut self, commission: f64, now: DateTime<Utc>) {
        self.total_sales += 1;
        self.total_earnings += commission;
        self.last_active = now;
    }
}

/// Affiliate network a sale callback is attributed to. Best-effort label only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AffiliateNetwork {
    Admitad,
    Cuelinks,
    Vcommission,
    Impact,
    Awin,
    Unknown,
}

impl AffiliateNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitad => "admitad",
            Self::Cuelinks => "cuelinks",
            Self::Vcommission => "vcommission",
            Self::Impact => "impact",
            Self::Awin => "awin",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AffiliateNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized sale postback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub amount: f64,
    pub commission: f64,
    pub currency: String,
    pub network: AffiliateNetwork,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// The callback payload as received.
    #[schema(value_type = Object)]
    pub raw_data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NetworkTotals {
    pub sales: u64,
    pub revenue: f64,
}

/// Revenue rollup for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetrics {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_sales: u64,
    #[serde(default)]
    pub total_revenue: f64,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkTotals>,
    #[serde(default)]
    pub avg_order_value: f64,
}

impl DailyMetrics {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_sales: 0,
            total_revenue: 0.0,
            networks: BTreeMap::new(),
            avg_order_value: 0.0,
        }
    }

    pub fn record_sale(&mut self, network: AffiliateNetwork, commission: f64) {
        self.total_sales += 1;
        self.total_revenue += commission;
        self.avg_order_value = self.total_revenue / self.total_sales as f64;

        let totals = self.networks.entry(network.to_string()).or_default();
        totals.sales += 1;
        totals.revenue += commission;
    }
}
