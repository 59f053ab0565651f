//! Error-to-response mapping.
//!
//! Every failure leaves the API as `{reason, message, location?}` with a
//! status derived from the error kind. Storage and internal errors are
//! logged server-side and surfaced as a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use quill_core::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    reason: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match &self.0 {
            Error::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError"),
            Error::Conflict { .. } => (StatusCode::CONFLICT, "Conflict"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            Error::Authentication(_) => (StatusCode::UNAUTHORIZED, "AuthenticationError"),
            Error::TokenExpired => (StatusCode::UNAUTHORIZED, "TokenExpired"),
            Error::Database(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        };

        let location = match &self.0 {
            Error::Validation { location, .. } | Error::Conflict { location, .. } => {
                location.clone()
            }
            _ => None,
        };

        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (
            status,
            Json(ErrorBody {
                reason,
                message,
                location,
            }),
        )
            .into_response()
    }
}
