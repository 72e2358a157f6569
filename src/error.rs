//! Error classification and response mapping.
//!
//! [`ApiError`] is the single point where internal failures become the
//! stable client-facing shape `{"success": false, "error": <string>}`.
//! Raw upstream errors are logged here and never reach the response body;
//! only the mapped message does.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::books::{messages, ServiceError};

/// A classified error: HTTP status plus the stable message for the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// A 400 with the given validation message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// The 404 shape for a missing book.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: messages::NOT_FOUND.to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => ApiError::validation(message),
            ServiceError::NotFound => ApiError::not_found(),
            ServiceError::RateLimited(detail) => {
                warn!(%detail, "request failed after exhausting retry budget");
                Self {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    message: messages::RATE_LIMITED.to_string(),
                }
            }
            ServiceError::Upstream(detail) => {
                error!(%detail, "upstream store failure");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: if detail.is_empty() {
                        messages::INTERNAL.to_string()
                    } else {
                        detail
                    },
                }
            }
        }
    }
}

/// Error response body, shared by every failure path.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
