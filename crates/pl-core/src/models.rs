//! # Domain Models
//!
//! Tenants (`Client`), the domains they allow (`ClientDomain`) and the
//! visitor comments scoped to pages on those domains.
//! Identities are store-assigned integers; `0` means "not persisted yet".

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::identity;

/// A tenant allowed to embed the comment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    /// Public identifier, used in URLs
    pub uuid: String,
    /// SHA-512 hex digest of the secret key. The plaintext is never kept.
    #[serde(skip_serializing)]
    pub key_hash: String,
}

impl Client {
    /// Builds a new, unsaved client with a fresh UUID and secret key.
    /// Returns the plaintext key alongside; it is not recoverable later.
    pub fn generate(name: impl Into<String>) -> anyhow::Result<(Self, String)> {
        let uuid = identity::generate_client_uuid()?;
        let key = identity::generate_secret_key()?;
        let client = Self {
            id: 0,
            name: name.into(),
            uuid,
            key_hash: identity::hash_secret(&key),
        };
        Ok((client, key))
    }

    /// Replaces the key hash with the digest of a new key and returns the plaintext.
    pub fn regenerate_key(&mut self) -> anyhow::Result<String> {
        let key = identity::generate_secret_key()?;
        self.key_hash = identity::hash_secret(&key);
        Ok(key)
    }

    pub fn verify_key(&self, key: &str) -> bool {
        identity::verify_secret(key, &self.key_hash)
    }
}

/// A domain (host only) a client has allowed to host its widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDomain {
    pub id: i64,
    pub client_id: i64,
    pub domain: String,
    /// Owning client, populated by listings. Not authoritative for identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
}

impl ClientDomain {
    /// An unsaved domain for `client`. The domain string is kept exactly as given.
    pub fn new(client: &Client, domain: impl Into<String>) -> Self {
        Self {
            id: 0,
            client_id: client.id,
            domain: domain.into(),
            client: Some(client.clone()),
        }
    }
}

/// What a request claims about itself, as read off the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequest {
    /// Client UUID as supplied; compared lower-cased
    pub client_uuid: String,
    /// Raw `Origin` header value
    pub origin: Option<String>,
    /// Plaintext secret key (`X-APIKey`)
    pub api_key: Option<String>,
    /// CORS preflight. Browsers send no custom headers on it, so the secret
    /// key is not checked; the origin still is.
    pub preflight: bool,
}

/// The (client, domain) pair the authorization gate resolved for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRequest {
    pub client: Client,
    pub domain: ClientDomain,
}

/// A single visitor comment on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub client_id: i64,
    pub domain_id: i64,
    pub author: String,
    pub content: String,
    pub page_url: String,
    pub hidden: bool,
    /// Unix seconds, UTC, stamped at creation
    pub timestamp: i64,
}

/// A validated comment waiting to be persisted.
///
/// Only constructible through [`NewComment::new`], so a store never sees
/// an empty author, content or page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    client_id: i64,
    domain_id: i64,
    author: String,
    content: String,
    page_url: String,
    timestamp: i64,
}

impl NewComment {
    pub fn new(
        auth: &AuthorizedRequest,
        author: impl Into<String>,
        content: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Result<Self> {
        let (author, content, page_url) = (author.into(), content.into(), page_url.into());
        if author.is_empty() || content.is_empty() || page_url.is_empty() {
            return Err(AppError::validation("missing required field"));
        }
        Ok(Self {
            client_id: auth.client.id,
            domain_id: auth.domain.id,
            author,
            content,
            page_url,
            timestamp: Utc::now().timestamp(),
        })
    }

    pub fn client_id(&self) -> i64 {
        self.client_id
    }

    pub fn domain_id(&self) -> i64 {
        self.domain_id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The persisted form, once the store has assigned an id.
    pub fn into_comment(self, id: i64) -> Comment {
        Comment {
            id,
            client_id: self.client_id,
            domain_id: self.domain_id,
            author: self.author,
            content: self.content,
            page_url: self.page_url,
            hidden: false,
            timestamp: self.timestamp,
        }
    }
}

/// Conjunctive comment query. `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentsFilter {
    pub client_id: Option<i64>,
    pub domain_id: Option<i64>,
    pub page_url: Option<String>,
    pub hidden: Option<bool>,
}

impl CommentsFilter {
    /// Visible comments of one page under an authorized client/domain.
    pub fn for_page(auth: &AuthorizedRequest, page_url: impl Into<String>) -> Self {
        Self {
            client_id: Some(auth.client.id),
            domain_id: Some(auth.domain.id),
            page_url: Some(page_url.into()),
            hidden: Some(false),
        }
    }

    pub fn matches(&self, comment: &Comment) -> bool {
        self.client_id.map_or(true, |id| comment.client_id == id)
            && self.domain_id.map_or(true, |id| comment.domain_id == id)
            && self.page_url.as_deref().map_or(true, |url| comment.page_url == url)
            && self.hidden.map_or(true, |h| comment.hidden == h)
    }
}

/// Number of comments on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCount {
    pub page_url: String,
    pub count: i64,
}

/// A plain-text email handed to an `EmailSender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Unix seconds, UTC
    pub timestamp: i64,
}

impl EmailMessage {
    pub fn new(
        from: impl Into<String>,
        to: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to,
            subject: subject.into(),
            body: body.into(),
            timestamp: Utc::now().timestamp(),
        }
    }
}
