//! API server: router assembly, HTTP listener and the metrics exporter.

use crate::error::ApiError;
use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use crate::{offers_rest, tracking_rest};
use affiliate_core::config::AppConfig;
use axum::http::Uri;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

/// Build the application router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Tracking
        .route("/click", get(tracking_rest::handle_click))
        .route("/affiliate/callback", post(tracking_rest::handle_callback))
        .route("/callback", post(tracking_rest::handle_callback))
        // Offers
        .route("/offers", get(offers_rest::handle_refresh))
        .route("/offers/fetch", get(offers_rest::handle_refresh))
        .route("/offers/ranked", get(offers_rest::handle_ranked))
        .route("/offers/personalized", get(offers_rest::handle_personalized))
        .route("/rank", get(offers_rest::handle_rank))
        // Users and analytics
        .route("/user/profile", get(offers_rest::handle_profile))
        .route("/analytics/daily", get(offers_rest::handle_daily))
        // Operational endpoints
        .route("/", get(rest::status))
        .route("/status", get(rest::status))
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .route("/api-docs/openapi.json", get(openapi_json))
        .fallback(not_found)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Endpoint not found: {}", uri.path()))
}

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server. Runs until the listener fails.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
