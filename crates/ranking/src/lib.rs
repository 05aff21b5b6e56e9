//! Offer catalog, global performance ranking and per-user personalization.

#![warn(clippy::unwrap_used)]

pub mod catalog;
pub mod personalization;
pub mod ranking;

pub use catalog::{CatalogRefresh, FeedSource, OfferCatalog};
pub use personalization::{personalize, sigmoid, PersonalizationEngine, PersonalizedFeed, UserSummary};
pub use ranking::{rank_offers, RankingEngine, RankingSummary};
