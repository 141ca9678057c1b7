//! Request extractors.

use axum::extract::{FromRequestParts, Path};
use axum::http::header::{AsHeaderName, ORIGIN};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use pl_core::{AccessRequest, AppError, AuthorizedRequest};

use crate::error::ApiError;
use crate::AppState;

pub const PAGE_URL_HEADER: &str = "x-pageurl";
pub const API_KEY_HEADER: &str = "x-apikey";

/// The client/domain pair resolved by the authorization gate.
///
/// Reads the client UUID from the `{uuid}` path segment, plus `Origin` and
/// `X-APIKey`. An OPTIONS request is passed to the gate as a preflight.
/// Any rejection is a plain 403.
pub struct Authorized(pub AuthorizedRequest);

impl FromRequestParts<AppState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Path(client_uuid) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotAuthorized)?;

        let request = AccessRequest {
            client_uuid,
            origin: header_value(&parts.headers, ORIGIN),
            api_key: header_value(&parts.headers, API_KEY_HEADER),
            preflight: parts.method == Method::OPTIONS,
        };
        let auth = state.auth.authorize(&request).await?;
        Ok(Self(auth))
    }
}

/// A header as an owned string. Missing and non-ASCII values both read as `None`.
pub fn header_value<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
