//! Offer feed, ranking, personalization, profile and analytics endpoints.

use crate::error::{ApiError, ApiResult};
use crate::rest::AppState;
use affiliate_core::types::{DailyMetrics, PersonalizedOffer, RankedOffer, UserProfile};
use affiliate_ranking::{RankingSummary, UserSummary};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserQuery {
    pub uid: Option<String>,
    /// Accepted when `uid` is absent.
    pub user_id: Option<String>,
}

impl UserQuery {
    fn user_id(&self) -> ApiResult<&str> {
        [self.uid.as_deref(), self.user_id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing user_id parameter"))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateQuery {
    /// `YYYY-MM-DD`; defaults to today (UTC).
    pub date: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub status: String,
    pub count: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct RankResponse {
    pub status: String,
    pub message: String,
    #[serde(flatten)]
    pub summary: RankingSummary,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedResponse {
    pub status: String,
    pub offers: Vec<PersonalizedOffer>,
    pub user: UserSummary,
    pub updated_at: DateTime<Utc>,
}

/// GET /offers — Reload the offer feed from its configured source.
#[utoipa::path(
    get,
    path = "/offers",
    tag = "Offers",
    responses(
        (status = 200, description = "Feed refreshed", body = RefreshResponse),
    )
)]
pub async fn handle_refresh(State(state): State<AppState>) -> ApiResult<Json<RefreshResponse>> {
    let refresh = state.catalog.refresh().await?;
    Ok(Json(RefreshResponse {
        status: "success".to_string(),
        count: refresh.count,
        updated_at: refresh.updated_at,
    }))
}

/// GET /rank — Recompute the global ranking.
#[utoipa::path(
    get,
    path = "/rank",
    tag = "Offers",
    responses(
        (status = 200, description = "Ranking published", body = RankResponse),
        (status = 404, description = "No offer feed", body = crate::error::ErrorResponse),
    )
)]
pub async fn handle_rank(State(state): State<AppState>) -> ApiResult<Json<RankResponse>> {
    let summary = state.ranking.run().await?;
    Ok(Json(RankResponse {
        status: "success".to_string(),
        message: "Offers ranked successfully".to_string(),
        summary,
    }))
}

/// GET /offers/ranked — Last published global ranking.
#[utoipa::path(
    get,
    path = "/offers/ranked",
    tag = "Offers",
    responses(
        (status = 200, description = "Ranked offers, best first", body = [RankedOffer]),
        (status = 404, description = "Ranking has not run", body = crate::error::ErrorResponse),
    )
)]
pub async fn handle_ranked(State(state): State<AppState>) -> ApiResult<Json<Vec<RankedOffer>>> {
    Ok(Json(state.ranking.ranked().await?))
}

/// GET /offers/personalized — Ranking re-scored for one user.
#[utoipa::path(
    get,
    path = "/offers/personalized",
    tag = "Offers",
    params(UserQuery),
    responses(
        (status = 200, description = "Personalized offers", body = PersonalizedResponse),
        (status = 400, description = "Missing user id", body = crate::error::ErrorResponse),
        (status = 404, description = "Ranking has not run", body = crate::error::ErrorResponse),
    )
)]
pub async fn handle_personalized(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<PersonalizedResponse>> {
    let user_id = query.user_id()?;
    let feed = state.personalization.personalize_for(user_id).await?;
    Ok(Json(PersonalizedResponse {
        status: "success".to_string(),
        offers: feed.offers,
        user: feed.user,
        updated_at: feed.updated_at,
    }))
}

/// GET /user/profile — A user's behavioral profile, created on first read.
#[utoipa::path(
    get,
    path = "/user/profile",
    tag = "Users",
    params(UserQuery),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 400, description = "Missing user id", body = crate::error::ErrorResponse),
    )
)]
pub async fn handle_profile(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<UserProfile>> {
    let user_id = query.user_id()?;
    Ok(Json(state.profiles.get_or_create(user_id).await?))
}

/// GET /analytics/daily — Revenue rollup for one UTC day.
#[utoipa::path(
    get,
    path = "/analytics/daily",
    tag = "Analytics",
    params(DateQuery),
    responses(
        (status = 200, description = "Daily metrics", body = DailyMetrics),
        (status = 400, description = "Malformed date", body = crate::error::ErrorResponse),
        (status = 404, description = "No sales recorded that day", body = crate::error::ErrorResponse),
    )
)]
pub async fn handle_daily(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<DailyMetrics>> {
    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request(format!("Invalid date '{raw}', expected YYYY-MM-DD")))?,
        None => Utc::now().date_naive(),
    };

    state
        .attributor
        .daily()
        .get(date)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No metrics found for date: {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_takes_precedence() {
        let both = UserQuery {
            uid: Some("a".to_string()),
            user_id: Some("b".to_string()),
        };
        assert_eq!(both.user_id().unwrap(), "a");

        let fallback = UserQuery {
            uid: Some(" ".to_string()),
            user_id: Some("b".to_string()),
        };
        assert_eq!(fallback.user_id().unwrap(), "b");

        let neither = UserQuery {
            uid: None,
            user_id: None,
        };
        assert_eq!(
            neither.user_id().unwrap_err().status(),
            axum::http::StatusCode::BAD_REQUEST
        );
    }
}
