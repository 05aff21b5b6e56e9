//! Mapping from domain errors to HTTP responses.

use affiliate_core::AffiliateError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `error`.
    pub status: String,
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AffiliateError> for ApiError {
    fn from(err: AffiliateError) -> Self {
        match err {
            AffiliateError::Validation(msg) => Self::bad_request(msg),
            AffiliateError::NotFound(msg) => Self::not_found(msg),
            other => {
                error!(error = %other, "Request failed");
                metrics::counter!("api.errors").increment(1);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal processing error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error".to_string(),
            error: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_status() {
        let cases = [
            (AffiliateError::validation("bad"), StatusCode::BAD_REQUEST),
            (AffiliateError::not_found("gone"), StatusCode::NOT_FOUND),
            (AffiliateError::store("down"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AffiliateError::Config("missing".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let err = ApiError::from(AffiliateError::store("redis://secret-host refused"));
        assert!(!err.message.contains("secret-host"));
        assert_eq!(err.code, "internal_error");
    }
}
