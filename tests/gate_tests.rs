mod common;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware, routing,
};
use axum_extra::extract::cookie::CookieJar;
use common::{TestAppBuilder, admin_user, get, location, send, set_cookies, state};
use folio_backend::{
    AppConfig,
    auth::{AuthError, IdentityProvider, MockIdentityProvider, Resolution, SessionTokens, SignedIn},
    gate::{self, Decision, PathClass, classify_path, page_decision, request_decision},
    routes::{admin, login},
};
use std::{sync::Arc, time::Duration};

fn rotated_tokens() -> SessionTokens {
    SessionTokens {
        access_token: "rotated-access".to_string(),
        refresh_token: "rotated-refresh".to_string(),
    }
}

fn with_session(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, "sb-access-token=old-access; sb-refresh-token=old-refresh")
        .body(Body::empty())
        .unwrap()
}

fn carries_rotated_cookies(cookies: &[String]) -> bool {
    cookies.iter().any(|c| c.starts_with("sb-access-token=rotated-access"))
        && cookies.iter().any(|c| c.starts_with("sb-refresh-token=rotated-refresh"))
}

/// Rotates the pair but ends up without a user, e.g. the refreshed token belongs to a
/// deleted account.
struct RotatesThenRejects;

#[async_trait]
impl IdentityProvider for RotatesThenRejects {
    async fn get_user(&self, _cookies: &CookieJar) -> Result<Resolution, AuthError> {
        Ok(Resolution {
            user: None,
            refreshed: Some(rotated_tokens()),
        })
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<SignedIn, AuthError> {
        Err(AuthError::InvalidCredentials)
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Only the request-level checkpoint, in front of handlers that check nothing themselves.
fn middleware_only(identity: Arc<dyn IdentityProvider>, config: AppConfig) -> Router {
    let state = state(identity, config);
    Router::new()
        .route("/admin", routing::get(|| async { "dashboard" }))
        .route("/admin/blog", routing::get(|| async { "blog" }))
        .route("/admin/login", routing::get(|| async { "login form" }))
        .route("/about", routing::get(|| async { "about" }))
        .layer(middleware::from_fn_with_state(state.clone(), gate::access_gate))
        .with_state(state)
}

/// Only the page-level checkpoint: the real admin routes, no middleware.
fn pages_only(identity: Arc<dyn IdentityProvider>) -> Router {
    let state = state(identity, AppConfig::default());
    Router::new()
        .nest(
            gate::ADMIN_ROOT,
            admin::admin_routes().merge(login::login_routes()),
        )
        .with_state(state)
}

// --- Classification ---

#[test]
fn test_classify_login_path_with_and_without_trailing_slash() {
    assert_eq!(classify_path("/admin/login"), PathClass::Login);
    assert_eq!(classify_path("/admin/login/"), PathClass::Login);
}

#[test]
fn test_classify_everything_under_admin_root_as_protected() {
    for path in [
        "/admin",
        "/admin/",
        "/admin/blog",
        "/admin/blog/new",
        "/admin/contacts/123",
        "/admin/login/extra",
        "/admin/loginx",
        "/admin//login",
    ] {
        assert_eq!(classify_path(path), PathClass::ProtectedAdmin, "{path}");
    }
}

#[test]
fn test_classify_everything_else_as_public() {
    for path in [
        "",
        "/",
        "/blog",
        "/administrator",
        "/admins",
        "/blog/admin",
        "admin",
        "/Admin",
        "/api/admin/login",
    ] {
        assert_eq!(classify_path(path), PathClass::Public, "{path}");
    }
}

#[test]
fn test_decision_tables() {
    use Decision::*;

    assert_eq!(request_decision(PathClass::ProtectedAdmin, false), Redirect("/admin/login"));
    assert_eq!(request_decision(PathClass::ProtectedAdmin, true), Allow);
    assert_eq!(request_decision(PathClass::Public, false), Allow);
    assert_eq!(request_decision(PathClass::Public, true), Allow);

    assert_eq!(page_decision(PathClass::ProtectedAdmin, false), Redirect("/admin/login"));
    assert_eq!(page_decision(PathClass::ProtectedAdmin, true), Allow);
    assert_eq!(page_decision(PathClass::Login, true), Redirect("/admin"));
    assert_eq!(page_decision(PathClass::Login, false), Allow);
    assert_eq!(page_decision(PathClass::Public, true), Allow);
}

#[test]
fn test_decisions_are_stable_across_repeated_evaluation() {
    for path in ["/admin", "/admin/login", "/admin/blog", "/blog"] {
        for authenticated in [false, true] {
            let class = classify_path(path);
            assert_eq!(classify_path(path), class);
            assert_eq!(
                request_decision(class, authenticated),
                request_decision(classify_path(path), authenticated)
            );
            assert_eq!(
                page_decision(class, authenticated),
                page_decision(classify_path(path), authenticated)
            );
        }
    }
}

// --- Request-level checkpoint alone ---

#[tokio::test]
async fn test_middleware_redirects_anonymous_protected_request() {
    let router = middleware_only(Arc::new(MockIdentityProvider::anonymous()), AppConfig::default());

    let response = send(&router, get("/admin/blog")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/login"));
}

#[tokio::test]
async fn test_middleware_bypasses_login_without_resolving_a_session() {
    let identity = Arc::new(MockIdentityProvider::authenticated(admin_user()));
    let router = middleware_only(identity.clone(), AppConfig::default());

    let response = send(&router, with_session("/admin/login")).await;

    // The middleware never redirects away from login; that is the page-level job.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(identity.calls(), 0);
}

#[tokio::test]
async fn test_middleware_does_not_resolve_sessions_on_public_paths() {
    let identity = Arc::new(MockIdentityProvider::anonymous());
    let router = middleware_only(identity.clone(), AppConfig::default());

    let response = send(&router, get("/about")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(identity.calls(), 0);
}

#[tokio::test]
async fn test_middleware_passes_authenticated_request_through() {
    let router = middleware_only(
        Arc::new(MockIdentityProvider::authenticated(admin_user())),
        AppConfig::default(),
    );

    let response = send(&router, with_session("/admin")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_middleware_fails_closed_when_provider_errors() {
    let router = middleware_only(Arc::new(MockIdentityProvider::failing()), AppConfig::default());

    let response = send(&router, with_session("/admin")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/login"));
}

#[tokio::test]
async fn test_middleware_fails_closed_when_provider_hangs() {
    let config = AppConfig {
        auth_timeout: Duration::from_millis(50),
        ..AppConfig::default()
    };
    let router = middleware_only(
        Arc::new(MockIdentityProvider::slow(Duration::from_secs(30))),
        config,
    );

    let response = tokio::time::timeout(Duration::from_secs(5), send(&router, with_session("/admin")))
        .await
        .expect("gate must not wait on a hung provider");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/login"));
}

#[tokio::test]
async fn test_middleware_propagates_rotated_cookies_on_pass_through() {
    let router = middleware_only(
        Arc::new(MockIdentityProvider::refreshing(admin_user(), rotated_tokens())),
        AppConfig::default(),
    );

    let response = send(&router, with_session("/admin/blog")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(carries_rotated_cookies(&set_cookies(&response)));
}

#[tokio::test]
async fn test_middleware_propagates_rotated_cookies_on_redirect() {
    let router = middleware_only(Arc::new(RotatesThenRejects), AppConfig::default());

    let response = send(&router, with_session("/admin/blog")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(carries_rotated_cookies(&set_cookies(&response)));
}

// --- Page-level checkpoint alone ---

#[tokio::test]
async fn test_page_check_redirects_anonymous_without_middleware() {
    let router = pages_only(Arc::new(MockIdentityProvider::anonymous()));

    for uri in ["/admin", "/admin/blog", "/admin/contacts", "/admin/settings"] {
        let response = send(&router, get(uri)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), Some("/admin/login"), "{uri}");
    }
}

#[tokio::test]
async fn test_page_check_sends_signed_in_user_away_from_login() {
    let router = pages_only(Arc::new(MockIdentityProvider::authenticated(admin_user())));

    let response = send(&router, with_session("/admin/login")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin"));
}

#[tokio::test]
async fn test_page_check_fails_closed_when_provider_errors() {
    let router = pages_only(Arc::new(MockIdentityProvider::failing()));

    let response = send(&router, with_session("/admin/blog")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/login"));
}

#[tokio::test]
async fn test_page_redirect_carries_rotated_cookies() {
    let router = pages_only(Arc::new(MockIdentityProvider::refreshing(
        admin_user(),
        rotated_tokens(),
    )));

    let response = send(&router, with_session("/admin/login")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(carries_rotated_cookies(&set_cookies(&response)));
}

// --- Both checkpoints together ---

#[tokio::test]
async fn test_anonymous_admin_root_redirects_to_login() {
    let app = TestAppBuilder::new(Arc::new(MockIdentityProvider::anonymous())).build();

    let response = send(&app.router, get("/admin")).await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), Some("/admin/login"));
}

#[tokio::test]
async fn test_authenticated_login_redirects_to_admin_root() {
    let app = TestAppBuilder::new(Arc::new(MockIdentityProvider::authenticated(admin_user()))).build();

    let response = send(&app.router, with_session("/admin/login")).await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), Some("/admin"));
}

#[tokio::test]
async fn test_authenticated_admin_page_renders() {
    let app = TestAppBuilder::new(Arc::new(MockIdentityProvider::authenticated(admin_user()))).build();

    let response = send(&app.router, with_session("/admin/blog")).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_login_form_is_served() {
    let identity = Arc::new(MockIdentityProvider::anonymous());
    let app = TestAppBuilder::new(identity.clone()).build();

    let response = send(&app.router, get("/admin/login")).await;

    assert_eq!(response.status(), StatusCode::OK);
    // Only the page-level check looked at the session.
    assert_eq!(identity.calls(), 1);
}

#[tokio::test]
async fn test_unknown_admin_paths_redirect_instead_of_404() {
    let app = TestAppBuilder::new(Arc::new(MockIdentityProvider::anonymous())).build();

    let response = send(&app.router, get("/admin/does-not-exist")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/login"));
}

#[tokio::test]
async fn test_lookalike_public_path_is_not_gated() {
    let identity = Arc::new(MockIdentityProvider::anonymous());
    let app = TestAppBuilder::new(identity.clone()).build();

    let response = send(&app.router, get("/administrator")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(identity.calls(), 0);
}

#[tokio::test]
async fn test_rotation_is_applied_once_and_reaches_the_client() {
    let app = TestAppBuilder::new(Arc::new(MockIdentityProvider::refreshing(
        admin_user(),
        rotated_tokens(),
    )))
    .build();

    let response = send(&app.router, with_session("/admin/blog")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(carries_rotated_cookies(&cookies));
    assert_eq!(
        cookies.iter().filter(|c| c.starts_with("sb-access-token=")).count(),
        1,
        "one Set-Cookie per session cookie: {cookies:?}"
    );
}

#[tokio::test]
async fn test_rotated_cookies_survive_error_responses() {
    let app = TestAppBuilder::new(Arc::new(MockIdentityProvider::refreshing(
        admin_user(),
        rotated_tokens(),
    )))
    .build();

    let uri = format!("/admin/blog/{}", uuid::Uuid::new_v4());
    let response = send(&app.router, with_session(&uri)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(carries_rotated_cookies(&set_cookies(&response)));
}

#[tokio::test]
async fn test_same_request_twice_yields_same_outcome() {
    for identity in [
        Arc::new(MockIdentityProvider::anonymous()),
        Arc::new(MockIdentityProvider::authenticated(admin_user())),
    ] {
        let app = TestAppBuilder::new(identity).build();

        for uri in ["/admin", "/admin/login", "/admin/blog", "/blog"] {
            let first = send(&app.router, with_session(uri)).await;
            let second = send(&app.router, with_session(uri)).await;

            assert_eq!(first.status(), second.status(), "{uri}");
            assert_eq!(location(&first), location(&second), "{uri}");
        }
    }
}
