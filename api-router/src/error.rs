use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

/// Wraps `AppError` for the HTTP boundary, mapping its closed kind set to
/// status codes per the not-found/bad-request/else-server-fault rule.
#[derive(Error, Debug)]
#[error("{inner}")]
pub struct ApiError {
    inner: AppError,
}

impl From<AppError> for ApiError {
    fn from(inner: AppError) -> Self {
        Self { inner }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.inner.kind() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(kind = self.inner.kind(), error = %self.inner, "request failed");
        }

        let body = ErrorResponse {
            error: self.inner.to_string(),
            kind: self.inner.kind(),
            status: "error",
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_indexed_surfaces_as_server_fault() {
        let err: ApiError = AppError::NotIndexed {
            workspace: "ws1".to_string(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err: ApiError = AppError::NotFound("run-1".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bad_request_maps_to_400() {
        let err: ApiError = AppError::BadRequest("bad input".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn policy_violation_maps_to_server_fault() {
        let err: ApiError = AppError::PolicyViolation("leaked secret".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
