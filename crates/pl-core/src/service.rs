//! # Comment Service
//!
//! Validation, scoping and aggregation on top of a `CommentStore`.
//! No caching: every call goes straight to the store.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{AuthorizedRequest, Comment, CommentCount, CommentsFilter, NewComment};
use crate::origin;
use crate::traits::CommentStore;

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn CommentStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn CommentStore>) -> Self {
        Self { store }
    }

    /// Creates a comment for an already authorized client/domain.
    pub async fn create(
        &self,
        auth: &AuthorizedRequest,
        author: &str,
        content: &str,
        page_url: &str,
    ) -> Result<Comment> {
        let new = NewComment::new(auth, author, content, page_url)?;
        let comment = self.store.create_comment(new).await?;
        info!(
            comment_id = comment.id,
            client = %auth.client.uuid,
            domain = %auth.domain.domain,
            "comment created"
        );
        Ok(comment)
    }

    pub async fn list(&self, filter: &CommentsFilter) -> Result<Vec<Comment>> {
        Ok(self.store.list_comments(filter).await?)
    }

    /// Visible comments of `page_url` under the authorized client/domain.
    pub async fn list_for_page(&self, auth: &AuthorizedRequest, page_url: &str) -> Result<Vec<Comment>> {
        self.list(&CommentsFilter::for_page(auth, page_url)).await
    }

    /// Counts comments per distinct URL across the whole comment set.
    ///
    /// Callers are expected to have scoped `urls` already; see [`Self::count_for_domain`].
    pub async fn count(&self, urls: &[String]) -> Result<Vec<CommentCount>> {
        if urls.is_empty() {
            return Err(AppError::validation("at least one page url is required"));
        }
        let distinct: Vec<String> = urls.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        Ok(self.store.count_comments(&distinct).await?)
    }

    /// Counts only the URLs that belong to the authorized domain.
    ///
    /// Foreign and unparseable URLs are dropped, not rejected. If nothing is
    /// left the store is not queried and the result is empty.
    ///
    /// Hidden comments are counted, so a page's count can exceed what
    /// [`Self::list_for_page`] returns for it.
    pub async fn count_for_domain(&self, auth: &AuthorizedRequest, urls: &[String]) -> Result<Vec<CommentCount>> {
        if urls.is_empty() {
            return Err(AppError::validation("at least one page url is required"));
        }
        let scoped = origin::scope_to_domain(&auth.domain, urls);
        if scoped.len() < urls.len() {
            debug!(
                domain = %auth.domain.domain,
                dropped = urls.len() - scoped.len(),
                "dropped out-of-domain urls from count"
            );
        }
        if scoped.is_empty() {
            return Ok(Vec::new());
        }
        self.count(&scoped).await
    }

    pub async fn set_hidden(&self, id: i64, hidden: bool) -> Result<()> {
        if !self.store.set_hidden(id, hidden).await? {
            return Err(AppError::NotFound("comment".into(), id.to_string()));
        }
        info!(comment_id = id, hidden, "comment visibility changed");
        Ok(())
    }

    /// Unconditional delete. Ownership must have been checked by the caller.
    pub async fn remove(&self, id: i64) -> Result<()> {
        if !self.store.remove_comment(id).await? {
            return Err(AppError::NotFound("comment".into(), id.to_string()));
        }
        info!(comment_id = id, "comment removed");
        Ok(())
    }
}
