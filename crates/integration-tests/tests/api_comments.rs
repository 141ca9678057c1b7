//! End to end: router + origin gate + SQLite + maildir.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use integration_tests::{seed, sqlite_store};
use pl_api::{router, AppState};
use pl_auth_simple::OriginAuthProvider;
use pl_core::traits::{ClientStore, DomainStore};
use pl_core::{AuthorizedRequest, CommentService};
use pl_db_sqlite::SqliteStore;
use pl_mail_maildir::MaildirSender;
use serde_json::{json, Value};
use tower::ServiceExt;

const SITE: &str = "https://blog.example.com";
const PAGE: &str = "https://blog.example.com/posts/1";

struct App {
    store: Arc<SqliteStore>,
    auth: AuthorizedRequest,
    key: String,
    router: Router,
}

async fn app(require_api_key: bool, maildir: Option<&Path>) -> App {
    let store = sqlite_store().await;
    let (auth, key) = seed(store.as_ref(), "blog", "blog.example.com").await;

    let gate = OriginAuthProvider::new(store.clone(), store.clone()).require_api_key(require_api_key);
    let mut state = AppState::new(Arc::new(gate), CommentService::new(store.clone()));
    if let Some(root) = maildir {
        state = state.with_mailer(Arc::new(MaildirSender::new(root)), "parley@example.com", "owner@example.com");
    }
    App {
        store,
        auth,
        key,
        router: router(state),
    }
}

impl App {
    fn uri(&self, suffix: &str) -> String {
        format!("/comment/{}{suffix}", self.auth.client.uuid)
    }

    async fn preflight(&self, uri: &str, origin: &str) -> StatusCode {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type, x-apikey")
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(req).await.unwrap().status()
    }

    async fn call(&self, method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ORIGIN, SITE)
            .header("X-PageURL", PAGE);
        if let Some(key) = key {
            builder = builder.header("X-APIKey", key);
        }
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let resp = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn comment_round_trip_over_sqlite() {
    let app = app(false, None).await;

    for content in ["first", "second"] {
        let (status, body) = app
            .call(Method::POST, &app.uri(""), None, Some(json!({"name": "ana", "content": content})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"msg": "Ok"}));
    }

    let (status, body) = app.call(Method::GET, &app.uri(""), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["comments"][0]["content"], "first");
    assert_eq!(body["comments"][1]["content"], "second");

    let (status, body) = app
        .call(
            Method::POST,
            &app.uri("/count"),
            None,
            Some(json!({"page_urls": [PAGE, "https://blog.example.com/posts/2", "https://elsewhere.org/posts/1"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"total": 2, "comment_count": [
            {"page_url": PAGE, "count": 2},
            {"page_url": "https://blog.example.com/posts/2", "count": 0},
        ]})
    );
}

#[tokio::test]
async fn api_key_mode() {
    let app = app(true, None).await;
    let payload = json!({"name": "ana", "content": "hi"});

    let (status, _) = app.call(Method::POST, &app.uri(""), None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::POST, &app.uri(""), Some("not-the-key"), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::POST, &app.uri(""), Some(&app.key), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, new_key) = app.store.regenerate_key(&app.auth.client.uuid).await.unwrap().unwrap();
    let (status, _) = app.call(Method::GET, &app.uri(""), Some(&app.key), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.call(Method::GET, &app.uri(""), Some(&new_key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn api_key_mode_preflight() {
    let app = app(true, None).await;
    let pingme = format!("/pingme/{}", app.auth.client.uuid);

    for uri in [app.uri(""), app.uri("/count"), pingme] {
        assert_eq!(app.preflight(&uri, SITE).await, StatusCode::NO_CONTENT, "{uri}");
    }
    assert_eq!(app.preflight(&app.uri("/count"), "https://elsewhere.org").await, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::POST, &app.uri("/count"), Some(&app.key), Some(json!({"page_urls": [PAGE]})))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn removed_domain_loses_access() {
    let app = app(false, None).await;
    app.store
        .remove_client_domain(&app.auth.client, "blog.example.com")
        .await
        .unwrap();

    let (status, _) = app.call(Method::GET, &app.uri(""), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn new_comment_is_mailed() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(false, Some(dir.path())).await;

    let (status, _) = app
        .call(Method::POST, &app.uri(""), None, Some(json!({"name": "ana", "content": "hello there"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // delivery happens in the background
    let new_dir = dir.path().join("new");
    let mut delivered = Vec::new();
    for _ in 0..100 {
        if let Ok(entries) = std::fs::read_dir(&new_dir) {
            delivered = entries.map(|e| e.unwrap().path()).collect();
            if !delivered.is_empty() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(delivered.len(), 1);

    let mail = std::fs::read_to_string(&delivered[0]).unwrap();
    assert!(mail.contains("To: owner@example.com\n"));
    assert!(mail.contains("Subject: New comment from ana at blog.example.com\n"));
    assert!(mail.ends_with(&format!("url: {PAGE}\n\nhello there")));
}

#[tokio::test]
async fn pingme_is_delivered_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(false, Some(dir.path())).await;

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/pingme/{}", app.auth.client.uuid),
            None,
            Some(json!({"name": "ana", "email": "ana@mail.com", "message": "hey"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let delivered: Vec<_> = std::fs::read_dir(dir.path().join("new")).unwrap().collect();
    assert_eq!(delivered.len(), 1);
}

#[tokio::test]
async fn clients_are_isolated() {
    let app = app(false, None).await;
    // a second tenant on the same host sees nothing of the first one's comments
    let (other, _) = app.store.create_client("other").await.unwrap();
    app.store.add_client_domain(&other, "blog.example.com").await.unwrap();

    let (status, _) = app
        .call(Method::POST, &app.uri(""), None, Some(json!({"name": "ana", "content": "mine"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(Method::GET, &format!("/comment/{}", other.uuid), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}
