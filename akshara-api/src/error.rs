//! Maps the daemon error taxonomy onto HTTP statuses and the standard
//! `{success, error, at}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use akshara_core::error::Error;
use akshara_core::utils::utc_now_string;

/// Axum-facing wrapper for [`Error`].
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::UnknownScheme(_)
            | Error::BadRequest { .. }
            | Error::Engine { .. }
            | Error::Upstream { .. }
            | Error::QueueFull { .. }
            | Error::PackAlreadyInstalled => StatusCode::BAD_REQUEST,

            Error::NoPacksFound
            | Error::PackNotFound
            | Error::PackPageNotFound
            | Error::PackFileNotFound => StatusCode::NOT_FOUND,

            Error::Auth { .. } => StatusCode::UNAUTHORIZED,

            Error::Io { .. } | Error::Configuration { .. } | Error::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "request failed");
        }

        let body = json!({
            "success": false,
            "error": self.0.to_string(),
            "at": utc_now_string(),
        });

        (status, Json(body)).into_response()
    }
}
