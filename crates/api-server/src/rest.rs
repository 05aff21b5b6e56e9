//! Shared state and the status and probe endpoints.

use crate::error::ApiResult;
use affiliate_core::config::AppConfig;
use affiliate_ranking::{OfferCatalog, PersonalizationEngine, RankingEngine};
use affiliate_store::RecordStore;
use affiliate_tracking::{ClickAttributor, ProfileDefaults, UserProfileStore};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::warn;
use utoipa::ToSchema;

const SERVICE_NAME: &str = "Affiliate Engine";

const ENDPOINTS: &[&str] = &[
    "GET /offers - Refresh the offer feed",
    "GET /offers/ranked - Get ranked offers",
    "GET /offers/personalized?uid={user_id} - Get personalized offers",
    "GET /click?offer_url={url}&user_id={id}&offer_id={id} - Track click",
    "POST /affiliate/callback - Handle sale callbacks",
    "GET /rank - Rank offers by performance",
    "GET /user/profile?uid={user_id} - Get user profile",
    "GET /analytics/daily?date={YYYY-MM-DD} - Get daily metrics",
    "GET /status - This status page",
];

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub records: RecordStore,
    pub attributor: ClickAttributor,
    pub profiles: UserProfileStore,
    pub catalog: OfferCatalog,
    pub ranking: RankingEngine,
    pub personalization: PersonalizationEngine,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(records: RecordStore, config: &AppConfig) -> Self {
        let profiles = UserProfileStore::new(
            records.clone(),
            ProfileDefaults::from_config(&config.tracking, &config.personalization),
        );
        let catalog = OfferCatalog::new(records.clone(), &config.catalog);
        Self {
            attributor: ClickAttributor::new(
                records.clone(),
                profiles.clone(),
                config.tracking.clone(),
            ),
            ranking: RankingEngine::new(records.clone(), catalog.clone()),
            catalog,
            personalization: PersonalizationEngine::new(records.clone(), profiles.clone()),
            profiles,
            records,
            node_id: config.node_id.clone(),
            start_time: Instant::now(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub node_id: String,
    pub store: String,
    pub timestamp: DateTime<Utc>,
    /// Last feed refresh, `null` before the first one.
    pub feed_updated_at: Option<String>,
    /// Last ranking run, `null` before the first one.
    pub ranking_updated_at: Option<String>,
    pub endpoints: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// GET /status — Service status and endpoint listing.
#[utoipa::path(
    get,
    path = "/status",
    tag = "Operations",
    responses(
        (status = 200, description = "Service status", body = StatusResponse),
    )
)]
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    Ok(Json(StatusResponse {
        status: "active".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        node_id: state.node_id.clone(),
        store: state.records.backend().backend_name().to_string(),
        timestamp: Utc::now(),
        feed_updated_at: state.catalog.last_updated().await?,
        ranking_updated_at: state.ranking.updated_at().await?,
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    }))
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe. 200 only while the store answers reads.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to accept traffic"),
        (status = 503, description = "Store unavailable"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.catalog.last_updated().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live — Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses(
        (status = 200, description = "Process is alive"),
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
