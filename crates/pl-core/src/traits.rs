//! # Core Traits (Ports)
//!
//! Any backend or plugin must implement these traits to be used by the binary.
//! Lookups return `Ok(None)` for a missing entity; `Err` always means the
//! backing store itself failed.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AccessRequest, AuthorizedRequest, Client, ClientDomain, Comment, CommentCount,
    CommentsFilter, EmailMessage, NewComment,
};

/// Persistence contract for clients.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Creates a client with a fresh UUID and key. Returns the plaintext key once.
    async fn create_client(&self, name: &str) -> anyhow::Result<(Client, String)>;
    async fn get_client_by_uuid(&self, uuid: &str) -> anyhow::Result<Option<Client>>;
    async fn list_clients(&self) -> anyhow::Result<Vec<Client>>;
    /// Removes the client and everything scoped to it. Unknown UUIDs are a no-op.
    async fn remove_client(&self, uuid: &str) -> anyhow::Result<()>;
    /// Replaces the client's key. `None` if no such client.
    async fn regenerate_key(&self, uuid: &str) -> anyhow::Result<Option<(Client, String)>>;
}

/// Persistence contract for the domains a client allows.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Fails if the (client, domain) pair already exists.
    async fn add_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<ClientDomain>;
    /// Removes the domain and its comments. Absent pairs are a no-op.
    async fn remove_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<()>;
    /// Exact, case-sensitive match on the stored domain string.
    async fn get_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<Option<ClientDomain>>;
    /// Every domain with its owning client populated.
    async fn list_domains(&self) -> anyhow::Result<Vec<ClientDomain>>;
}

/// Persistence contract for comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn create_comment(&self, comment: NewComment) -> anyhow::Result<Comment>;
    /// Conjunction of the present filter fields, oldest first.
    async fn list_comments(&self, filter: &CommentsFilter) -> anyhow::Result<Vec<Comment>>;
    /// One entry per distinct URL, zero-filled, ordered by URL. Rejects an empty slice.
    async fn count_comments(&self, urls: &[String]) -> anyhow::Result<Vec<CommentCount>>;
    /// Returns whether a comment was updated.
    async fn set_hidden(&self, id: i64, hidden: bool) -> anyhow::Result<bool>;
    /// Returns whether a comment was deleted.
    async fn remove_comment(&self, id: i64) -> anyhow::Result<bool>;
}

/// Outbound mail delivery.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()>;
}

/// Decides whether a request may act as a client on its origin domain.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `NotAuthorized` for every denial, `Store` when the backend fails.
    async fn authorize(&self, request: &AccessRequest) -> Result<AuthorizedRequest>;
}
