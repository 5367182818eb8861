use crate::domain_model::{AccessToken, RefreshToken, SessionCredential, UserIdentity};
use crate::domain_port::{KeyValueStore, RefreshOrigin, SessionRefresher, StorageError};
use crate::session::claims::decode_claims;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

pub const DEFAULT_LOW_WATER_SECS: i64 = 300;

/// Minimum spacing between two background refresh attempts.
const PROACTIVE_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    #[serde(flatten)]
    identity: UserIdentity,
    expires_at: DateTime<Utc>,
}

fn parse_user(raw: &str) -> Option<StoredUser> {
    match serde_json::from_str(raw) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(error = %e, "cached user is unreadable");
            None
        }
    }
}

/// Client-side session state on top of a [`KeyValueStore`].
///
/// Nothing is cached in memory: every read goes back to storage, so a logout
/// or refresh performed through another handle is seen immediately.
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    low_water_secs: i64,
    refresher: OnceLock<Weak<dyn SessionRefresher>>,
    last_proactive: Mutex<Option<Instant>>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_low_water(storage, DEFAULT_LOW_WATER_SECS)
    }

    pub fn with_low_water(storage: Arc<dyn KeyValueStore>, low_water_secs: i64) -> Self {
        Self {
            storage,
            low_water_secs,
            refresher: OnceLock::new(),
            last_proactive: Mutex::new(None),
        }
    }

    /// Wires the proactive refresh path. Only the first call takes effect.
    pub fn attach_refresher(&self, refresher: Weak<dyn SessionRefresher>) {
        if self.refresher.set(refresher).is_err() {
            debug!("session refresher already attached");
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "session storage read failed");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.read(ACCESS_TOKEN_KEY).map(AccessToken)
    }

    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.read(REFRESH_TOKEN_KEY).map(RefreshToken)
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        let raw = self.read(USER_KEY)?;
        parse_user(&raw).map(|stored| stored.identity)
    }

    /// The full credential, or `None`. Leftovers of a half-written session
    /// are removed so they cannot be mistaken for a login later.
    pub fn session(&self) -> Option<SessionCredential> {
        let snapshot = match self.storage.get_all(&SESSION_KEYS) {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "session storage read failed");
                return None;
            }
        };
        let mut values = snapshot.into_iter().map(|v| v.filter(|v| !v.is_empty()));
        let access = values.next().flatten().map(AccessToken);
        let refresh = values.next().flatten().map(RefreshToken);
        let raw_user = values.next().flatten();
        let empty = access.is_none() && refresh.is_none() && raw_user.is_none();
        match (access, refresh, raw_user.as_deref().and_then(parse_user)) {
            (Some(access_token), Some(refresh_token), Some(stored)) => Some(SessionCredential {
                access_token,
                refresh_token,
                expires_at: stored.expires_at,
                user: stored.identity,
            }),
            _ if empty => None,
            _ => {
                warn!("partial session found in storage, clearing it");
                self.clear_session();
                None
            }
        }
    }

    pub fn set_session(&self, credential: &SessionCredential) -> Result<(), StorageError> {
        let user = serde_json::to_string(&StoredUser {
            identity: credential.user.clone(),
            expires_at: credential.expires_at,
        })?;
        self.storage.set_all(&[
            (ACCESS_TOKEN_KEY, credential.access_token.0.clone()),
            (REFRESH_TOKEN_KEY, credential.refresh_token.0.clone()),
            (USER_KEY, user),
        ])?;
        debug!(username = %credential.user.username, expires_at = %credential.expires_at, "session stored");
        Ok(())
    }

    pub fn clear_session(&self) {
        let present = match self.storage.get_all(&SESSION_KEYS) {
            Ok(values) => values.iter().any(Option::is_some),
            Err(_) => true,
        };
        if !present {
            return;
        }
        match self.storage.remove_all(&SESSION_KEYS) {
            Ok(()) => info!("session cleared"),
            Err(e) => warn!(error = %e, "failed to clear session storage"),
        }
    }

    /// True when an access token is stored and its `exp` lies in the future.
    ///
    /// A token close to expiry, or already past it, also kicks off a
    /// background refresh. That refresh never changes the answer given here.
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        let Some(token) = self.access_token() else {
            return false;
        };
        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "stored access token is malformed");
                return false;
            }
        };
        let left = claims.seconds_left(now);
        if left < self.low_water_secs {
            self.spawn_proactive_refresh(left);
        }
        left > 0
    }

    fn spawn_proactive_refresh(&self, seconds_left: i64) {
        let Some(refresher) = self.refresher.get().and_then(|weak| weak.upgrade()) else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime for proactive refresh");
            return;
        };
        {
            let mut last = self
                .last_proactive
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if last.is_some_and(|at| at.elapsed() < PROACTIVE_RETRY_AFTER) {
                return;
            }
            *last = Some(Instant::now());
        }
        debug!(seconds_left, "access token near expiry, refreshing ahead of time");
        handle.spawn(async move {
            if let Err(e) = refresher.refresh_session(RefreshOrigin::Proactive).await {
                warn!(error = %e, "proactive token refresh failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::Role;
    use crate::domain_port::RefreshError;
    use crate::infra::MemoryKeyValueStore;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn jwt(exp: i64) -> AccessToken {
        let claims = serde_json::json!({ "sub": "admin", "exp": exp });
        AccessToken(
            encode(
                &Header::new(Algorithm::HS256),
                &claims,
                &EncodingKey::from_secret(b"k"),
            )
            .unwrap(),
        )
    }

    fn credential(access_token: AccessToken) -> SessionCredential {
        SessionCredential {
            access_token,
            refresh_token: RefreshToken("refresh".into()),
            expires_at: Utc::now(),
            user: UserIdentity {
                username: "admin".into(),
                email: "admin@inventario.test".into(),
                nombre_completo: "Administrador".into(),
                role: Role::Administrador,
            },
        }
    }

    fn store() -> (Arc<MemoryKeyValueStore>, TokenStore) {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let store = TokenStore::new(storage.clone());
        (storage, store)
    }

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl SessionRefresher for CountingRefresher {
        async fn refresh_session(&self, origin: RefreshOrigin) -> Result<AccessToken, RefreshError> {
            assert_eq!(origin, RefreshOrigin::Proactive);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RefreshError::Unavailable { status: 500 })
            } else {
                Ok(AccessToken("new".into()))
            }
        }
    }

    #[test]
    fn session_round_trips_through_storage() {
        let (_, store) = store();
        let cred = credential(jwt(Utc::now().timestamp() + 3600));
        store.set_session(&cred).unwrap();

        assert_eq!(store.session(), Some(cred.clone()));
        assert_eq!(store.current_user(), Some(cred.user));
        assert!(store.is_authenticated());
    }

    #[test]
    fn malformed_or_expired_tokens_fail_closed() {
        let (_, store) = store();
        assert!(!store.is_authenticated());

        store
            .set_session(&credential(AccessToken("invalid_token".into())))
            .unwrap();
        assert!(!store.is_authenticated());

        store
            .set_session(&credential(jwt(Utc::now().timestamp() - 5)))
            .unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn partial_session_is_discarded() {
        let (storage, store) = store();
        storage
            .set_all(&[(ACCESS_TOKEN_KEY, "orphan".to_string())])
            .unwrap();

        assert_eq!(store.session(), None);
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let (storage, store) = store();
        store
            .set_session(&credential(jwt(Utc::now().timestamp() + 60)))
            .unwrap();
        store.clear_session();
        store.clear_session();

        for key in SESSION_KEYS {
            assert_eq!(storage.get(key).unwrap(), None);
        }
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn near_expiry_triggers_one_background_refresh() {
        let (_, store) = store();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let weak: Weak<CountingRefresher> = Arc::downgrade(&refresher);
        store.attach_refresher(weak);

        store
            .set_session(&credential(jwt(Utc::now().timestamp() + 3600)))
            .unwrap();
        assert!(store.is_authenticated());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);

        store
            .set_session(&credential(jwt(Utc::now().timestamp() + 120)))
            .unwrap();
        assert!(store.is_authenticated());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_background_refresh_keeps_the_answer() {
        let (_, store) = store();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let weak: Weak<CountingRefresher> = Arc::downgrade(&refresher);
        store.attach_refresher(weak);

        let cred = credential(jwt(Utc::now().timestamp() + 30));
        store.set_session(&cred).unwrap();
        assert!(store.is_authenticated());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.session(), Some(cred));
    }

    #[tokio::test]
    async fn expired_token_still_triggers_a_background_refresh() {
        let (_, store) = store();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let weak: Weak<CountingRefresher> = Arc::downgrade(&refresher);
        store.attach_refresher(weak);

        store
            .set_session(&credential(jwt(Utc::now().timestamp() - 1)))
            .unwrap();
        assert!(!store.is_authenticated());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_background_refresh_is_not_retried_on_every_check() {
        let (_, store) = store();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let weak: Weak<CountingRefresher> = Arc::downgrade(&refresher);
        store.attach_refresher(weak);

        store
            .set_session(&credential(jwt(Utc::now().timestamp() + 30)))
            .unwrap();
        for _ in 0..5 {
            assert!(store.is_authenticated());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unreadable_user_counts_as_partial_session() {
        let (storage, store) = store();
        storage
            .set_all(&[
                (ACCESS_TOKEN_KEY, "a".to_string()),
                (REFRESH_TOKEN_KEY, "r".to_string()),
                (USER_KEY, "{not json".to_string()),
            ])
            .unwrap();

        assert_eq!(store.session(), None);
        assert_eq!(storage.get_all(&SESSION_KEYS).unwrap(), vec![None, None, None]);
    }

    #[test]
    fn concurrent_reads_never_tear_a_stored_session() {
        let (storage, store) = store();
        let store = Arc::new(store);
        let cred = credential(jwt(Utc::now().timestamp() + 3600));

        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let _ = store.session();
                }
            })
        };
        for _ in 0..2_000 {
            store.set_session(&cred).unwrap();
            let present = storage
                .get_all(&SESSION_KEYS)
                .unwrap()
                .into_iter()
                .filter(Option::is_some)
                .count();
            assert!(present == 0 || present == SESSION_KEYS.len(), "{present} keys left");
        }
        reader.join().unwrap();
    }

    #[test]
    fn near_expiry_without_runtime_still_answers() {
        let (_, store) = store();
        store
            .set_session(&credential(jwt(Utc::now().timestamp() + 10)))
            .unwrap();
        assert!(store.is_authenticated());
    }
}
