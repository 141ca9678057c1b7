//! # pl-api
//!
//! The HTTP surface of parley: routing, the authorization extractor and
//! the JSON wire contract of the comment widget.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use pl_core::traits::{AuthProvider, EmailSender};
use pl_core::{AppError, CommentService, EmailMessage};
use tracing::{debug, error};

const DEFAULT_MAIL_ADDRESS: &str = "parley@localhost";

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub comments: CommentService,
    /// `None` disables notifications and the contact endpoint
    pub mailer: Option<Arc<dyn EmailSender>>,
    pub mail_from: String,
    pub notify_address: String,
}

impl AppState {
    pub fn new(auth: Arc<dyn AuthProvider>, comments: CommentService) -> Self {
        Self {
            auth,
            comments,
            mailer: None,
            mail_from: DEFAULT_MAIL_ADDRESS.into(),
            notify_address: DEFAULT_MAIL_ADDRESS.into(),
        }
    }

    pub fn with_mailer(
        mut self,
        mailer: Arc<dyn EmailSender>,
        from: impl Into<String>,
        notify_address: impl Into<String>,
    ) -> Self {
        self.mailer = Some(mailer);
        self.mail_from = from.into();
        self.notify_address = notify_address.into();
        self
    }

    fn message(&self, subject: String, body: String) -> EmailMessage {
        EmailMessage::new(self.mail_from.clone(), vec![self.notify_address.clone()], subject, body)
    }

    /// Delivers a message to the notify address and waits for the result.
    pub async fn notify(&self, subject: String, body: String) -> pl_core::Result<()> {
        let Some(mailer) = &self.mailer else {
            return Err(AppError::Store(anyhow::anyhow!("mail delivery is not configured")));
        };
        mailer.send(self.message(subject, body)).await.map_err(AppError::Store)
    }

    /// Fire-and-forget delivery. Failures are only logged.
    pub fn notify_in_background(&self, subject: String, body: String) {
        let Some(mailer) = self.mailer.clone() else {
            debug!("mail disabled, notification dropped");
            return;
        };
        let message = self.message(subject, body);
        tokio::spawn(async move {
            if let Err(e) = mailer.send(message).await {
                error!(error = ?e, "failed to send notification");
            }
        });
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/comment/{uuid}",
            get(handlers::list_comments)
                .post(handlers::create_comment)
                .options(handlers::preflight),
        )
        .route(
            "/comment/{uuid}/count",
            post(handlers::count_comments).options(handlers::authorized_preflight),
        )
        .route(
            "/pingme/{uuid}",
            post(handlers::pingme).options(handlers::authorized_preflight),
        )
        .layer(axum::middleware::from_fn(middleware::echo_origin))
        .layer(middleware::trace_layer())
        .with_state(state)
}
