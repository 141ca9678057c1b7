//! # pl-auth-simple
//!
//! Store-backed implementation of `AuthProvider`.
//! Resolves the client named by the request, optionally checks its secret
//! key, and confirms the request `Origin` is one of the client's domains.

use std::sync::Arc;

use async_trait::async_trait;
use pl_core::origin::host_from_url;
use pl_core::traits::{AuthProvider, ClientStore, DomainStore};
use pl_core::{AccessRequest, AppError, AuthorizedRequest, Result};
use tracing::{debug, error, warn};

pub struct OriginAuthProvider {
    clients: Arc<dyn ClientStore>,
    domains: Arc<dyn DomainStore>,
    /// Secret-key mode: every request must also carry the client's key
    require_api_key: bool,
}

impl OriginAuthProvider {
    pub fn new(clients: Arc<dyn ClientStore>, domains: Arc<dyn DomainStore>) -> Self {
        Self {
            clients,
            domains,
            require_api_key: false,
        }
    }

    pub fn require_api_key(mut self, required: bool) -> Self {
        self.require_api_key = required;
        self
    }
}

/// Every denial looks the same to the caller; the reason only reaches the log.
fn deny(reason: &'static str, client: &str) -> AppError {
    warn!(reason, client, "request not authorized");
    AppError::NotAuthorized
}

#[async_trait]
impl AuthProvider for OriginAuthProvider {
    async fn authorize(&self, request: &AccessRequest) -> Result<AuthorizedRequest> {
        let uuid = request.client_uuid.to_lowercase();

        // A failed lookup is indistinguishable from an unknown client, so
        // probing cannot tell which UUIDs exist.
        let client = match self.clients.get_client_by_uuid(&uuid).await {
            Ok(Some(client)) => client,
            Ok(None) => return Err(deny("unknown client", &uuid)),
            Err(e) => {
                error!(error = %e, client = %uuid, "client lookup failed");
                return Err(AppError::NotAuthorized);
            }
        };

        if self.require_api_key && !request.preflight {
            match request.api_key.as_deref() {
                Some(key) if client.verify_key(key) => {}
                Some(_) => return Err(deny("bad api key", &uuid)),
                None => return Err(deny("missing api key", &uuid)),
            }
        }

        let Some(host) = request.origin.as_deref().and_then(host_from_url) else {
            return Err(deny("missing or malformed origin", &uuid));
        };

        let domain = self
            .domains
            .get_client_domain(&client, host)
            .await
            .map_err(|e| {
                error!(error = %e, client = %uuid, host, "domain lookup failed");
                AppError::Store(e)
            })?;

        match domain {
            Some(domain) => {
                debug!(client = %uuid, host, "request authorized");
                Ok(AuthorizedRequest { client, domain })
            }
            None => Err(deny("domain not registered", &uuid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use pl_core::memory::MemoryStore;
    use pl_core::traits::{MockClientStore, MockDomainStore};
    use pl_core::Client;

    struct Fixture {
        store: Arc<MemoryStore>,
        client: Client,
        key: String,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let (client, key) = store.create_client("a client").await.unwrap();
        store.add_client_domain(&client, "example.com").await.unwrap();
        Fixture { store, client, key }
    }

    impl Fixture {
        fn gate(&self, require_api_key: bool) -> OriginAuthProvider {
            OriginAuthProvider::new(self.store.clone(), self.store.clone()).require_api_key(require_api_key)
        }

        fn request(&self, origin: Option<&str>) -> AccessRequest {
            AccessRequest {
                client_uuid: self.client.uuid.clone(),
                origin: origin.map(str::to_string),
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn test_authorized_origin() {
        let fx = fixture().await;
        let gate = fx.gate(false);

        for origin in [
            "https://example.com",
            "https://example.com:8443",
            "http://example.com/anything/at/all",
        ] {
            let auth = gate.authorize(&fx.request(Some(origin))).await.unwrap();
            assert_eq!(auth.client.id, fx.client.id);
            assert_eq!(auth.domain.domain, "example.com");
        }
    }

    #[tokio::test]
    async fn test_uuid_is_lowercased() {
        let fx = fixture().await;
        let mut req = fx.request(Some("https://example.com"));
        req.client_uuid = req.client_uuid.to_uppercase();
        assert!(fx.gate(false).authorize(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_origins_denied_alike() {
        let fx = fixture().await;
        let gate = fx.gate(false);

        for origin in [
            Some("https://other.com"),
            Some("https://sub.example.com"),
            Some("example.com"),
            Some("https://a://example.com"),
            None,
        ] {
            let res = gate.authorize(&fx.request(origin)).await;
            assert!(matches!(res, Err(AppError::NotAuthorized)), "{origin:?}");
        }
    }

    #[tokio::test]
    async fn test_unknown_client_denied() {
        let fx = fixture().await;
        let req = AccessRequest {
            client_uuid: "00000000-0000-4000-8000-000000000000".into(),
            origin: Some("https://example.com".into()),
            ..Default::default()
        };
        assert!(matches!(fx.gate(false).authorize(&req).await, Err(AppError::NotAuthorized)));
    }

    #[tokio::test]
    async fn test_removed_domain_denied() {
        let fx = fixture().await;
        fx.store.remove_client_domain(&fx.client, "example.com").await.unwrap();

        assert!(fx.store.get_client_domain(&fx.client, "example.com").await.unwrap().is_none());
        let res = fx.gate(false).authorize(&fx.request(Some("https://example.com"))).await;
        assert!(matches!(res, Err(AppError::NotAuthorized)));
    }

    #[tokio::test]
    async fn test_api_key_mode() {
        let fx = fixture().await;
        let gate = fx.gate(true);

        let mut req = fx.request(Some("https://example.com"));
        assert!(matches!(gate.authorize(&req).await, Err(AppError::NotAuthorized)));

        req.api_key = Some("wrong".into());
        assert!(matches!(gate.authorize(&req).await, Err(AppError::NotAuthorized)));

        req.api_key = Some(fx.key.clone());
        assert!(gate.authorize(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_preflight_skips_key_but_not_origin() {
        let fx = fixture().await;
        let gate = fx.gate(true);

        let mut req = fx.request(Some("https://example.com"));
        req.preflight = true;
        assert!(gate.authorize(&req).await.is_ok());

        req.origin = Some("https://other.com".into());
        assert!(matches!(gate.authorize(&req).await, Err(AppError::NotAuthorized)));
    }

    #[tokio::test]
    async fn test_regenerated_key_replaces_old() {
        let fx = fixture().await;
        let (_, new_key) = fx.store.regenerate_key(&fx.client.uuid).await.unwrap().unwrap();
        let gate = fx.gate(true);

        let mut req = fx.request(Some("https://example.com"));
        req.api_key = Some(fx.key.clone());
        assert!(matches!(gate.authorize(&req).await, Err(AppError::NotAuthorized)));

        req.api_key = Some(new_key);
        assert!(gate.authorize(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_client_lookup_failure_is_denial() {
        let mut clients = MockClientStore::new();
        clients
            .expect_get_client_by_uuid()
            .with(eq("some-uuid"))
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let mut domains = MockDomainStore::new();
        domains.expect_get_client_domain().never();

        let gate = OriginAuthProvider::new(Arc::new(clients), Arc::new(domains));
        let req = AccessRequest {
            client_uuid: "SOME-UUID".into(),
            origin: Some("https://example.com".into()),
            ..Default::default()
        };
        assert!(matches!(gate.authorize(&req).await, Err(AppError::NotAuthorized)));
    }

    #[tokio::test]
    async fn test_domain_lookup_failure_is_store_error() {
        let (client, _) = Client::generate("a client").unwrap();
        let uuid = client.uuid.clone();

        let mut clients = MockClientStore::new();
        clients
            .expect_get_client_by_uuid()
            .returning(move |_| Ok(Some(client.clone())));
        let mut domains = MockDomainStore::new();
        domains
            .expect_get_client_domain()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));

        let gate = OriginAuthProvider::new(Arc::new(clients), Arc::new(domains));
        let req = AccessRequest {
            client_uuid: uuid,
            origin: Some("https://example.com".into()),
            ..Default::default()
        };
        assert!(matches!(gate.authorize(&req).await, Err(AppError::Store(_))));
    }
}
