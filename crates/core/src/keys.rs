//! Key shapes for records in the key-value store.

use chrono::NaiveDate;

pub const OFFER_FEED: &str = "offer_feed";
pub const OFFER_FEED_RANKED: &str = "offer_feed_ranked";
pub const RANKING_UPDATED_AT: &str = "ranking_updated_at";
pub const FEED_UPDATED_AT: &str = "last_updated";

/// Click ids are used verbatim as keys, including ids minted elsewhere.
pub fn click(click_id: &str) -> String {
    click_id.to_string()
}

pub fn offer_stats(offer_id: &str) -> String {
    format!("offer_stats_{offer_id}")
}

pub fn user_profile(user_id: &str) -> String {
    format!("user_{user_id}")
}

pub fn personalized_feed(user_id: &str) -> String {
    format!("offers_ranked_{user_id}")
}

/// Sale keys double as sale ids returned to the caller.
pub fn sale(click_or_order_id: &str, timestamp_ms: i64) -> String {
    format!("sale_{click_or_order_id}_{timestamp_ms}")
}

pub fn daily_metrics(date: NaiveDate) -> String {
    format!("daily_metrics_{}", date.format("%Y-%m-%d"))
}
