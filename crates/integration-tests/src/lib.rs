//! Shared fixtures for the cross-crate tests.

use std::sync::Arc;

use pl_core::memory::MemoryStore;
use pl_core::traits::{ClientStore, CommentStore, DomainStore};
use pl_core::AuthorizedRequest;
use pl_db_sqlite::SqliteStore;

/// Anything that can back all three storage ports.
pub trait Backend: ClientStore + DomainStore + CommentStore + 'static {}

impl<T: ClientStore + DomainStore + CommentStore + 'static> Backend for T {}

pub async fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub async fn sqlite_store() -> Arc<SqliteStore> {
    let store = SqliteStore::in_memory().await.unwrap();
    store.init_schema().await.unwrap();
    Arc::new(store)
}

/// A fresh client with one allowed domain. Returns the pair and the
/// client's plaintext key.
pub async fn seed<S: Backend>(store: &S, name: &str, domain: &str) -> (AuthorizedRequest, String) {
    let (client, key) = store.create_client(name).await.unwrap();
    let domain = store.add_client_domain(&client, domain).await.unwrap();
    (AuthorizedRequest { client, domain }, key)
}

pub fn urls(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|u| u.to_string()).collect()
}
