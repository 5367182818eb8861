//! Session lifecycle against the in-process fake backend: login, refresh
//! single-flight, failure handling and logout.

mod common;

use common::{Harness, eventually};
use futures_util::future::join_all;
use inventory_client::application_port::{
    AuthError, AuthService, LoginInput, ProductoService, UserService,
};
use inventory_client::domain_model::{RefreshToken, Role};
use inventory_client::domain_port::{KeyValueStore, RefreshError};
use inventory_client::fake_backend::{FakeBackendConfig, RefreshMode};
use inventory_client::gateway::ApiError;
use inventory_client::guard::{GuardDecision, RouteGuard};
use inventory_client::session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use std::time::Duration;

#[tokio::test]
async fn admin_login_stores_an_authenticated_session() {
    let harness = Harness::start();

    let user = harness.login("admin", "admin123").await;

    assert_eq!(user.role, Role::Administrador);
    assert_eq!(user.nombre_completo, "Administrador del Sistema");
    assert!(harness.auth().is_authenticated());
    assert_eq!(harness.auth().current_user(), Some(user));
    assert!(harness.auth().validate_token().await);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let harness = Harness::start();

    let result = harness
        .auth()
        .login(LoginInput {
            username: "admin".into(),
            password: "nope".into(),
        })
        .await;

    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    assert!(harness.tokens().session().is_none());
    assert_eq!(harness.state().refresh_calls(), 0);
}

#[tokio::test]
async fn expired_access_token_is_refreshed_transparently() {
    let harness = Harness::start();
    harness.login("admin", "admin123").await;
    harness.expire_access_token();
    let stale = harness.tokens().access_token();

    let page = harness.productos().list(0, 10).await.unwrap();

    assert_eq!(page.number, 0);
    assert_eq!(harness.state().refresh_calls(), 1);
    let fresh = harness.tokens().access_token();
    assert!(fresh.is_some());
    assert_ne!(fresh, stale);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_share_one_refresh() {
    let harness = Harness::start();
    harness.login("admin", "admin123").await;
    harness.expire_access_token();
    harness
        .state()
        .set_refresh_delay(Duration::from_millis(300));

    let productos = harness.productos();
    let results = join_all((0..8).map(|_| productos.list(0, 5))).await;

    assert!(results.iter().all(Result::is_ok), "{results:?}");
    assert_eq!(harness.state().refresh_calls(), 1);

    // Every replay carried the token produced by that one refresh.
    let fresh = harness.tokens().access_token().unwrap();
    let accepted = harness.state().accepted_bearers();
    assert_eq!(accepted.len(), 8);
    assert!(accepted.iter().all(|bearer| *bearer == fresh.0));
}

#[tokio::test]
async fn replayed_request_is_not_retried_again() {
    let harness = Harness::start();
    harness.login("admin", "admin123").await;
    harness.state().set_reject_all_bearers(true);

    let err = harness.productos().get(1).await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized { status: 401 }), "{err:?}");
    assert_eq!(harness.state().refresh_calls(), 1);
    assert!(harness.tokens().session().is_some());
}

#[tokio::test]
async fn malformed_stored_token_fails_closed() {
    let harness = Harness::start();
    harness
        .storage
        .set_all(&[
            (ACCESS_TOKEN_KEY, "definitely-not-a-jwt".to_string()),
            (REFRESH_TOKEN_KEY, "also-garbage".to_string()),
            (
                USER_KEY,
                r#"{"username":"admin","email":"","nombreCompleto":"","role":"ADMINISTRADOR","expiresAt":"2030-01-01T00:00:00Z"}"#
                    .to_string(),
            ),
        ])
        .unwrap();

    assert!(!harness.auth().is_authenticated());
    let user = harness.auth().current_user();
    assert_eq!(
        RouteGuard::default().check("/productos", false, user.as_ref()),
        GuardDecision::RedirectToLogin
    );

    // The backend refuses the bearer and the bogus refresh token; the session goes.
    let err = harness.productos().list(0, 10).await.unwrap_err();
    assert!(
        matches!(err, ApiError::Refresh(RefreshError::Rejected { status: 400 })),
        "{err:?}"
    );
    assert!(harness.tokens().session().is_none());
    assert!(harness.tokens().access_token().is_none());
}

#[tokio::test]
async fn failed_proactive_refresh_keeps_the_session() {
    let harness = Harness::start_with(FakeBackendConfig {
        access_ttl: chrono::Duration::seconds(60),
        ..Default::default()
    });
    harness.login("usuario", "usuario123").await;
    harness.state().set_refresh_mode(RefreshMode::Fail);
    let before = harness.tokens().access_token();

    assert!(harness.tokens().is_authenticated());
    assert!(eventually(|| harness.state().refresh_calls() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(harness.tokens().session().is_some());
    assert_eq!(harness.tokens().access_token(), before);
    assert_eq!(harness.storage.removals(), 0);
}

#[tokio::test]
async fn successful_proactive_refresh_rotates_tokens() {
    let harness = Harness::start_with(FakeBackendConfig {
        access_ttl: chrono::Duration::seconds(60),
        ..Default::default()
    });
    harness.login("usuario", "usuario123").await;
    let before = harness.tokens().access_token();

    assert!(harness.tokens().is_authenticated());
    assert!(eventually(|| harness.tokens().access_token() != before).await);
    assert!(harness.state().refresh_calls() >= 1);
    assert_eq!(
        harness.tokens().current_user().map(|u| u.role),
        Some(Role::Usuario)
    );
}

#[tokio::test]
async fn logout_clears_everything_and_revokes_refresh_token() {
    let harness = Harness::start();
    harness.login("admin", "admin123").await;
    let RefreshToken(refresh) = harness.tokens().refresh_token().unwrap();

    harness.auth().logout().await;

    assert!(harness.tokens().session().is_none());
    assert!(harness.tokens().access_token().is_none());
    assert!(harness.tokens().refresh_token().is_none());
    assert!(harness.tokens().current_user().is_none());
    assert!(!harness.auth().is_authenticated());
    assert!(harness.state().consume_refresh_token(&refresh).is_none());
}

#[tokio::test]
async fn logout_clears_locally_when_backend_is_gone() {
    let harness = Harness::start();
    harness.login("admin", "admin123").await;
    let Harness {
        backend, gateway, ..
    } = harness;
    backend.shutdown().await;

    let auth = inventory_client::application_impl::RealAuthService::new(gateway.clone());
    auth.logout().await;

    assert!(gateway.token_store().session().is_none());
}

#[tokio::test]
async fn rejected_refresh_drains_queue_and_clears_once() {
    let harness = Harness::start();
    harness.login("admin", "admin123").await;
    harness.expire_access_token();
    harness.state().set_refresh_mode(RefreshMode::Reject);
    harness
        .state()
        .set_refresh_delay(Duration::from_millis(200));

    let productos = harness.productos();
    let results = join_all((0..6).map(|_| productos.list(0, 10))).await;

    assert_eq!(results.len(), 6);
    for result in &results {
        assert!(matches!(result, Err(ApiError::Refresh(_))), "{result:?}");
    }
    assert_eq!(harness.state().refresh_calls(), 1);
    assert!(harness.tokens().session().is_none());
    assert_eq!(harness.storage.removals(), 1);
}

#[tokio::test]
async fn valid_token_without_role_is_forbidden_and_logged_out() {
    let harness = Harness::start();
    harness.login("usuario", "usuario123").await;

    let err = harness.users().list_all().await.unwrap_err();

    assert!(matches!(err, ApiError::Forbidden), "{err:?}");
    assert_eq!(harness.state().refresh_calls(), 0);
    assert!(harness.tokens().session().is_none());
}

#[tokio::test]
async fn anonymous_request_never_reaches_refresh_endpoint() {
    let harness = Harness::start();

    let err = harness.productos().list(0, 10).await.unwrap_err();

    assert!(
        matches!(err, ApiError::Refresh(RefreshError::MissingRefreshToken)),
        "{err:?}"
    );
    assert_eq!(harness.state().refresh_calls(), 0);
}

#[tokio::test]
async fn explicit_refresh_rotates_and_old_refresh_token_dies() {
    let harness = Harness::start();
    harness.login("admin", "admin123").await;
    let RefreshToken(old_refresh) = harness.tokens().refresh_token().unwrap();
    let old_access = harness.tokens().access_token();

    let new_access = harness.auth().refresh_token().await.unwrap();

    assert_ne!(Some(new_access), old_access);
    assert!(harness.state().consume_refresh_token(&old_refresh).is_none());
    assert!(harness.auth().is_authenticated());
}
