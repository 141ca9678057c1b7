//! parley/crates/pl-api/src/middleware.rs Middleware
//!
//! Request tracing and the CORS origin echo.

use axum::extract::Request;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::trace::{HttpMakeClassifier, TraceLayer};

/// One span per request with method, path and status.
pub fn trace_layer() -> TraceLayer<HttpMakeClassifier> {
    TraceLayer::new_for_http()
}

/// Echoes the request `Origin` in `Access-Control-Allow-Origin` on
/// successful responses. Denied requests get no CORS grant.
pub async fn echo_origin(request: Request, next: Next) -> Response {
    let origin = request.headers().get(ORIGIN).cloned();
    let mut response = next.run(request).await;
    if let Some(origin) = origin {
        if response.status().is_success() {
            response.headers_mut().insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
    }
    response
}
