//! HTTP mapping of matchmaking errors
//!
//! Bodies have the shape `{"success": false, "error": {"kind", "message"}}`.
//! Store and internal failures are logged in full and answered with a generic
//! message.

use crate::error::{ErrorKind, MatchmakingError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug)]
pub enum ApiError {
    /// Missing, malformed or unknown session token
    Unauthenticated(String),
    /// Request body or query could not be read
    BadRequest(String),
    /// Failure reported by the matchmaking core
    Core(MatchmakingError),
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(err) => status_for(err.kind()),
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            ApiError::Unauthenticated(reason) => ErrorDetail {
                kind: ErrorKind::Unauthorized.as_str(),
                message: reason.clone(),
            },
            ApiError::BadRequest(reason) => ErrorDetail {
                kind: ErrorKind::InvalidArgument.as_str(),
                message: reason.clone(),
            },
            ApiError::Core(err) => ErrorDetail {
                kind: err.kind().as_str(),
                message: err.public_message(),
            },
        }
    }
}

/// Authorization failures from the core happen after a valid session was
/// presented, so they are 403 rather than 401.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyWaiting | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<MatchmakingError> for ApiError {
    fn from(err: MatchmakingError) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed with {}: {:?}", status, self);
        } else {
            warn!("Request rejected with {}: {:?}", status, self);
        }

        let body = ErrorBody {
            success: false,
            error: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}
