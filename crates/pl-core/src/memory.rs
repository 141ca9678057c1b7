//! # In-memory backend
//!
//! Implements every storage port over `DashMap`s. Used by tests and by
//! deployments that do not need persistence. Removing a client or a domain
//! cascades to whatever is scoped to it, like the SQL backend does.
//!
//! There are no cross-map transactions. A domain insert holds the owning
//! client's entry, so it cannot interleave with that client's removal. A
//! comment insert does not lock its domain, and a comment created while its
//! domain is being removed can outlive it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::bail;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::{Client, ClientDomain, Comment, CommentCount, CommentsFilter, NewComment};
use crate::traits::{ClientStore, CommentStore, DomainStore};

#[derive(Default)]
pub struct MemoryStore {
    last_id: AtomicI64,
    /// keyed by UUID
    clients: DashMap<String, Client>,
    /// keyed by (client id, domain)
    domains: DashMap<(i64, String), ClientDomain>,
    comments: DashMap<i64, Comment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn client_by_id(&self, id: i64) -> Option<Client> {
        self.clients.iter().find(|c| c.id == id).map(|c| c.value().clone())
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn create_client(&self, name: &str) -> anyhow::Result<(Client, String)> {
        let (mut client, key) = Client::generate(name)?;
        match self.clients.entry(client.uuid.clone()) {
            Entry::Occupied(_) => bail!("client uuid {} already exists", client.uuid),
            Entry::Vacant(slot) => {
                client.id = self.next_id();
                slot.insert(client.clone());
            }
        }
        Ok((client, key))
    }

    async fn get_client_by_uuid(&self, uuid: &str) -> anyhow::Result<Option<Client>> {
        Ok(self.clients.get(uuid).map(|c| c.value().clone()))
    }

    async fn list_clients(&self) -> anyhow::Result<Vec<Client>> {
        let mut clients: Vec<Client> = self.clients.iter().map(|c| c.value().clone()).collect();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }

    async fn remove_client(&self, uuid: &str) -> anyhow::Result<()> {
        if let Some((_, client)) = self.clients.remove(uuid) {
            self.domains.retain(|_, d| d.client_id != client.id);
            self.comments.retain(|_, c| c.client_id != client.id);
        }
        Ok(())
    }

    async fn regenerate_key(&self, uuid: &str) -> anyhow::Result<Option<(Client, String)>> {
        let Some(mut client) = self.clients.get_mut(uuid) else {
            return Ok(None);
        };
        let key = client.regenerate_key()?;
        Ok(Some((client.value().clone(), key)))
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn add_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<ClientDomain> {
        // Held until the insert is done; a concurrent remove_client waits on it.
        let owner = self.clients.get(&client.uuid).filter(|c| c.id == client.id);
        if owner.is_none() {
            bail!("client {} does not exist", client.uuid);
        }
        match self.domains.entry((client.id, domain.to_string())) {
            Entry::Occupied(_) => bail!("domain {domain} already registered for client {}", client.uuid),
            Entry::Vacant(slot) => {
                let mut cd = ClientDomain::new(client, domain);
                cd.id = self.next_id();
                slot.insert(cd.clone());
                Ok(cd)
            }
        }
    }

    async fn remove_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<()> {
        if let Some((_, cd)) = self.domains.remove(&(client.id, domain.to_string())) {
            self.comments.retain(|_, c| c.domain_id != cd.id);
        }
        Ok(())
    }

    async fn get_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<Option<ClientDomain>> {
        Ok(self.domains.get(&(client.id, domain.to_string())).map(|d| ClientDomain {
            client: None,
            ..d.value().clone()
        }))
    }

    async fn list_domains(&self) -> anyhow::Result<Vec<ClientDomain>> {
        let mut domains: Vec<ClientDomain> = self.domains.iter().map(|d| d.value().clone()).collect();
        domains.sort_by_key(|d| d.id);
        for d in domains.iter_mut() {
            d.client = self.client_by_id(d.client_id);
        }
        Ok(domains)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create_comment(&self, comment: NewComment) -> anyhow::Result<Comment> {
        let comment = comment.into_comment(self.next_id());
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, filter: &CommentsFilter) -> anyhow::Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| filter.matches(c))
            .map(|c| c.value().clone())
            .collect();
        comments.sort_by_key(|c| (c.timestamp, c.id));
        Ok(comments)
    }

    async fn count_comments(&self, urls: &[String]) -> anyhow::Result<Vec<CommentCount>> {
        if urls.is_empty() {
            bail!("at least one url is required");
        }
        let mut totals: BTreeMap<&str, i64> = urls.iter().map(|u| (u.as_str(), 0)).collect();
        for comment in self.comments.iter() {
            if let Some(total) = totals.get_mut(comment.page_url.as_str()) {
                *total += 1;
            }
        }
        Ok(totals
            .into_iter()
            .map(|(page_url, count)| CommentCount { page_url: page_url.to_string(), count })
            .collect())
    }

    async fn set_hidden(&self, id: i64, hidden: bool) -> anyhow::Result<bool> {
        Ok(match self.comments.get_mut(&id) {
            Some(mut c) => {
                c.hidden = hidden;
                true
            }
            None => false,
        })
    }

    async fn remove_comment(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.comments.remove(&id).is_some())
    }
}
