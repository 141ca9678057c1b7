//! # pl-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core
//! comment service. Every handler except the bare preflight runs behind the
//! [`Authorized`] extractor.

use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use pl_core::{AppError, Comment, CommentCount};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::extract::{header_value, Authorized, PAGE_URL_HEADER};
use crate::AppState;

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, X-PageURL, X-APIKey";

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MsgResponse {
    pub msg: String,
}

impl MsgResponse {
    fn ok() -> Self {
        Self { msg: "Ok".into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub author: String,
    pub content: String,
    pub timestamp: i64,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            author: c.author,
            content: c.content,
            timestamp: c.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCommentsResponse {
    pub total: usize,
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CountCommentsRequest {
    #[serde(default)]
    pub page_urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountCommentsResponse {
    pub total: usize,
    pub comment_count: Vec<CommentCount>,
}

#[derive(Debug, Deserialize)]
pub struct PingMeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|_| ApiError(AppError::validation("malformed json")))
}

fn page_url(headers: &HeaderMap) -> String {
    header_value(headers, PAGE_URL_HEADER).unwrap_or_default()
}

/// `POST /comment/{uuid}`: stores a comment for the `X-PageURL` page and
/// queues a notification mail.
pub async fn create_comment(
    State(state): State<AppState>,
    Authorized(auth): Authorized,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<MsgResponse>)> {
    let req: CreateCommentRequest = parse_json(&body)?;
    let page_url = page_url(&headers);

    state.comments.create(&auth, &req.name, &req.content, &page_url).await?;

    state.notify_in_background(
        format!("New comment from {} at {}", req.name, auth.domain.domain),
        format!("url: {page_url}\n\n{}", req.content),
    );
    Ok((StatusCode::CREATED, Json(MsgResponse::ok())))
}

/// `GET /comment/{uuid}`: visible comments of the `X-PageURL` page, oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    Authorized(auth): Authorized,
    headers: HeaderMap,
) -> ApiResult<Json<ListCommentsResponse>> {
    let comments = state.comments.list_for_page(&auth, &page_url(&headers)).await?;
    Ok(Json(ListCommentsResponse {
        total: comments.len(),
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}

/// `POST /comment/{uuid}/count`
pub async fn count_comments(
    State(state): State<AppState>,
    Authorized(auth): Authorized,
    body: Bytes,
) -> ApiResult<Json<CountCommentsResponse>> {
    let req: CountCommentsRequest = parse_json(&body)?;
    let counts = state.comments.count_for_domain(&auth, &req.page_urls).await?;
    Ok(Json(CountCommentsResponse {
        total: counts.len(),
        comment_count: counts,
    }))
}

/// `POST /pingme/{uuid}`: a contact message to the site owner. Unlike
/// comment notifications this is delivered before responding.
pub async fn pingme(
    State(state): State<AppState>,
    Authorized(auth): Authorized,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<MsgResponse>)> {
    let req: PingMeRequest = parse_json(&body)?;
    if req.name.is_empty() || req.email.is_empty() || req.message.is_empty() {
        return Err(AppError::validation("missing required params").into());
    }

    state
        .notify(
            format!("New message from {} at {}", req.name, auth.domain.domain),
            format!("email: {}\n\n{}", req.email, req.message),
        )
        .await?;

    info!(client = %auth.client.uuid, domain = %auth.domain.domain, "contact message sent");
    Ok((StatusCode::CREATED, Json(MsgResponse::ok())))
}

/// CORS preflight. The origin itself is echoed by the middleware.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
            (ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS),
            (ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
        ],
    )
}

/// Preflight that is only granted to an authorized origin.
pub async fn authorized_preflight(_auth: Authorized) -> impl IntoResponse {
    preflight().await
}
