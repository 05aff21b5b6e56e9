//! OpenAPI document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Affiliate Engine API",
        version = "0.1.0",
        description = "Affiliate click tracking, sale attribution and offer personalization.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Tracking", description = "Click redirects and sale postbacks"),
        (name = "Offers", description = "Offer feed, global ranking and personalized ranking"),
        (name = "Users", description = "Behavioral user profiles"),
        (name = "Analytics", description = "Daily revenue rollups"),
        (name = "Operations", description = "Status, health, readiness, and liveness probes"),
    ),
    paths(
        // Tracking
        crate::tracking_rest::handle_click,
        crate::tracking_rest::handle_callback,
        // Offers
        crate::offers_rest::handle_refresh,
        crate::offers_rest::handle_rank,
        crate::offers_rest::handle_ranked,
        crate::offers_rest::handle_personalized,
        // Users and analytics
        crate::offers_rest::handle_profile,
        crate::offers_rest::handle_daily,
        // Operations
        crate::rest::status,
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Domain records
        affiliate_core::types::Offer,
        affiliate_core::types::OfferStats,
        affiliate_core::types::RankedOffer,
        affiliate_core::types::PersonalizedOffer,
        affiliate_core::types::UserProfile,
        affiliate_core::types::DailyMetrics,
        affiliate_core::types::NetworkTotals,
        affiliate_ranking::RankingSummary,
        affiliate_ranking::UserSummary,
        // Responses
        crate::tracking_rest::CallbackResponse,
        crate::offers_rest::RefreshResponse,
        crate::offers_rest::RankResponse,
        crate::offers_rest::PersonalizedResponse,
        crate::rest::StatusResponse,
        crate::rest::HealthResponse,
        crate::error::ErrorResponse,
    ))
)]
pub struct ApiDoc;
