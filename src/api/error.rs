//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::zoom::ZoomError;

/// Structured error response body for mobile clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing appointment id")]
    MissingAppointmentId,
    #[error("Meeting provider error: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::MissingAppointmentId => (
                StatusCode::BAD_REQUEST,
                "MISSING_APPOINTMENT_ID",
                "appointmentId is required".to_string(),
            ),
            ApiError::Upstream(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MEETING_PROVIDER",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "meeting API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ZoomError> for ApiError {
    fn from(err: ZoomError) -> Self {
        match err {
            // A parse failure means the provider contract changed; keep
            // the detail server-side.
            ZoomError::ResponseParsing(detail) => ApiError::Internal(detail),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
