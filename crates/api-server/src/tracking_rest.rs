//! Click redirect and sale postback endpoints.

use crate::error::ApiResult;
use crate::rest::AppState;
use affiliate_tracking::{ClickRequest, SaleCallback};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ClickQuery {
    /// Absolute http(s) URL of the offer landing page.
    pub offer_url: Option<String>,
    pub user_id: Option<String>,
    pub offer_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub status: String,
    pub sale_id: String,
    pub message: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address as reported by the edge proxy.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "cf-connecting-ip")
        .or_else(|| {
            header_str(headers, "x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
        })
        .map(str::to_string)
}

/// GET /click — Record a click and redirect to the offer.
#[utoipa::path(
    get,
    path = "/click",
    tag = "Tracking",
    params(ClickQuery),
    responses(
        (status = 302, description = "Redirect to the offer with click_id and source appended"),
        (status = 400, description = "Missing or invalid parameters", body = crate::error::ErrorResponse),
    )
)]
pub async fn handle_click(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ClickQuery>,
) -> ApiResult<Response> {
    let request = ClickRequest {
        offer_url: query.offer_url,
        user_id: query.user_id,
        offer_id: query.offer_id,
        user_agent: header_str(&headers, header::USER_AGENT.as_str()).map(str::to_string),
        referer: header_str(&headers, header::REFERER.as_str()).map(str::to_string),
        ip: client_ip(&headers),
        country: header_str(&headers, "cf-ipcountry").map(str::to_string),
    };

    let outcome = state.attributor.record_click(request).await?;
    metrics::counter!("api.clicks").increment(1);

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, outcome.redirect_url)],
    )
        .into_response())
}

/// POST /affiliate/callback — Sale postback from an affiliate network.
#[utoipa::path(
    post,
    path = "/affiliate/callback",
    tag = "Tracking",
    request_body(
        content = String,
        description = "JSON object or form-urlencoded fields from the network",
    ),
    responses(
        (status = 200, description = "Sale recorded", body = CallbackResponse),
        (status = 400, description = "Neither click id nor order id present", body = crate::error::ErrorResponse),
    )
)]
pub async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<CallbackResponse>> {
    let callback = SaleCallback {
        content_type: header_str(&headers, header::CONTENT_TYPE.as_str()).map(str::to_string),
        user_agent: header_str(&headers, header::USER_AGENT.as_str()).map(str::to_string),
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let outcome = state.attributor.process_sale_callback(callback).await?;
    if !outcome.attributed {
        debug!(sale_id = %outcome.sale_id, "Sale stored without click attribution");
    }

    Ok(Json(CallbackResponse {
        status: "success".to_string(),
        sale_id: outcome.sale_id,
        message: "Sale recorded successfully".to_string(),
    }))
}
