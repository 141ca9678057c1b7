//! HTTP mapping of `AppError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pl_core::AppError;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

// Store failures are logged here and never echoed back to the caller.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AppError::NotAuthorized => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(kind, id) => (StatusCode::NOT_FOUND, format!("{kind} {id} not found")),
            AppError::Store(e) => {
                error!(error = ?e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, message).into_response()
    }
}
