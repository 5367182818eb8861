#![allow(dead_code)]

use inventory_client::application_impl::*;
use inventory_client::application_port::{AuthService, LoginInput};
use inventory_client::domain_model::{AccessToken, UserIdentity};
use inventory_client::domain_port::{KeyValueStore, StorageError};
use inventory_client::fake_backend::{BackendState, FakeBackend, FakeBackendConfig};
use inventory_client::gateway::{ApiGateway, GatewayConfig};
use inventory_client::infra::MemoryKeyValueStore;
use inventory_client::session::TokenStore;
use inventory_client::settings::{Endpoints, Resources};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Memory storage that counts how often keys were actually removed.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryKeyValueStore,
    removals: AtomicUsize,
}

impl CountingStore {
    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn get_all(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        self.inner.get_all(keys)
    }

    fn set_all(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        self.inner.set_all(entries)
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_all(keys)
    }
}

pub fn endpoints() -> Endpoints {
    Endpoints {
        login: "/auth/login".into(),
        refresh: "/auth/refresh-token".into(),
        logout: "/auth/logout".into(),
        validate: "/auth/validate-token".into(),
        register: "/auth/register".into(),
    }
}

pub struct Harness {
    pub backend: FakeBackend,
    pub storage: Arc<CountingStore>,
    pub gateway: Arc<ApiGateway>,
}

impl Harness {
    pub fn start() -> Harness {
        Self::start_with(FakeBackendConfig::default())
    }

    pub fn start_with(config: FakeBackendConfig) -> Harness {
        let backend = FakeBackend::start_local(config).expect("fake backend should bind");
        let storage = Arc::new(CountingStore::default());
        let tokens = Arc::new(TokenStore::with_low_water(storage.clone(), 300));
        let config = GatewayConfig {
            base_url: backend.base_url(),
            timeout: Duration::from_secs(5),
            endpoints: endpoints(),
            resources: Resources::default(),
        };
        let gateway = ApiGateway::new(config, tokens).expect("gateway should build");
        Harness {
            backend,
            storage,
            gateway,
        }
    }

    pub fn state(&self) -> &Arc<BackendState> {
        self.backend.state()
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.gateway.token_store()
    }

    pub fn auth(&self) -> RealAuthService {
        RealAuthService::new(self.gateway.clone())
    }

    pub fn productos(&self) -> RealProductoService {
        RealProductoService::new(self.gateway.clone())
    }

    pub fn users(&self) -> RealUserService {
        RealUserService::new(self.gateway.clone())
    }

    pub fn categorias(&self) -> RealCategoriaService {
        RealCategoriaService::new(self.gateway.clone())
    }

    pub fn historial(&self) -> RealHistorialService {
        RealHistorialService::new(self.gateway.clone())
    }

    pub async fn login(&self, username: &str, password: &str) -> UserIdentity {
        self.auth()
            .login(LoginInput {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("login should succeed")
    }

    /// Swaps the stored access token for one that expired a minute ago,
    /// keeping the refresh token valid.
    pub fn expire_access_token(&self) {
        let mut session = self.tokens().session().expect("a stored session");
        let expired = self
            .state()
            .issue_access_token(&session.user.username, chrono::Duration::seconds(-60))
            .expect("token for a seeded account");
        session.access_token = AccessToken(expired);
        self.tokens().set_session(&session).expect("memory store accepts writes");
    }
}

/// Polls `check` for up to a second.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
