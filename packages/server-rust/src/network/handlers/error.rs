//! `{"error": "..."}` responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::service::ServiceError;
use crate::traits::StoreError;

/// Error returned by every API handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists { .. }
        | StoreError::IdTaken { .. }
        | StoreError::IdSpaceExhausted { .. } => StatusCode::CONFLICT,
        StoreError::InvalidId { .. } => StatusCode::BAD_REQUEST,
        StoreError::Remote { .. } => StatusCode::BAD_GATEWAY,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::UnknownBusiness(_)
            | ServiceError::RecordNotFound { .. }
            | ServiceError::UnknownField { .. } => StatusCode::NOT_FOUND,
            ServiceError::Form(_) | ServiceError::Schema(_) => StatusCode::BAD_REQUEST,
            ServiceError::Store(store) => store_status(store),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Fallback for unrouted paths.
pub async fn not_found_handler() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "endpoint not found")
}
