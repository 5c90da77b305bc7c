//! Access gate for the admin area.
//!
//! Two independent checkpoints share one path classifier:
//!
//! * [`access_gate`] runs as router middleware on every request, before any handler.
//! * [`AdminSession`] and [`GuestOnly`] run as extractors inside the admin handlers.
//!
//! Both fail closed: an unreachable identity provider, a timeout or a corrupt cookie all
//! resolve to "no session".

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{FromRef, FromRequestParts, OriginalUri, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::{ACCESS_COOKIE, AuthError, IdentityState, REFRESH_COOKIE, SessionTokens, SessionUser},
    config::AppConfig,
};

/// Root of the admin area.
pub const ADMIN_ROOT: &str = "/admin";
/// The admin sign-in page.
pub const LOGIN_PATH: &str = "/admin/login";

/// PathClass
///
/// The bucket a request path falls into. Every checkpoint derives it from
/// [`classify_path`] so the two layers can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    Login,
    ProtectedAdmin,
}

/// classify_path
///
/// Total over all strings. Only the login page itself (with or without a trailing slash)
/// is `Login`; everything else at or below `/admin` is `ProtectedAdmin`.
pub fn classify_path(path: &str) -> PathClass {
    if path == LOGIN_PATH || path.strip_suffix('/') == Some(LOGIN_PATH) {
        return PathClass::Login;
    }

    match path.strip_prefix(ADMIN_ROOT) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => PathClass::ProtectedAdmin,
        _ => PathClass::Public,
    }
}

/// What a checkpoint does with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(&'static str),
}

/// request_decision
///
/// Request-level policy. The login page never reaches this function: the middleware
/// bypasses it before resolving a session.
pub fn request_decision(class: PathClass, authenticated: bool) -> Decision {
    match class {
        PathClass::ProtectedAdmin if !authenticated => Decision::Redirect(LOGIN_PATH),
        _ => Decision::Allow,
    }
}

/// page_decision
///
/// Page-level policy. Unlike the request level it also sends signed-in users away from
/// the login form.
pub fn page_decision(class: PathClass, authenticated: bool) -> Decision {
    match class {
        PathClass::ProtectedAdmin if !authenticated => Decision::Redirect(LOGIN_PATH),
        PathClass::Login if authenticated => Decision::Redirect(ADMIN_ROOT),
        _ => Decision::Allow,
    }
}

/// SessionCheck
///
/// The result of one session resolution: who the caller is, and any token pair the
/// provider rotated along the way.
#[derive(Debug, Clone, Default)]
pub struct SessionCheck {
    pub user: Option<SessionUser>,
    pub refreshed: Option<SessionTokens>,
}

impl SessionCheck {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// resolve_session
///
/// Asks the identity provider who owns the cookies in `headers`, bounded by `timeout`.
/// Any failure is logged and treated as "no session".
pub async fn resolve_session(
    identity: &IdentityState,
    headers: &HeaderMap,
    timeout: Duration,
) -> SessionCheck {
    let jar = CookieJar::from_headers(headers);

    let outcome = match tokio::time::timeout(timeout, identity.get_user(&jar)).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout),
    };

    match outcome {
        Ok(resolution) => SessionCheck {
            user: resolution.user,
            refreshed: resolution.refreshed,
        },
        Err(e) => {
            tracing::warn!(error = %e, "session resolution failed, treating caller as anonymous");
            SessionCheck::default()
        }
    }
}

/// PendingCookies
///
/// Request-scoped slot through which a page-level check hands rotated tokens back to the
/// middleware, which writes them onto the outgoing response.
#[derive(Clone, Default)]
pub struct PendingCookies(Arc<Mutex<Option<SessionTokens>>>);

impl PendingCookies {
    pub fn put(&self, tokens: SessionTokens) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(tokens);
        }
    }

    pub fn take(&self) -> Option<SessionTokens> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Attaches `Set-Cookie` for `tokens` (if any) to `response`.
fn with_cookies(response: Response, tokens: Option<&SessionTokens>, secure: bool) -> Response {
    match tokens {
        Some(tokens) => (tokens.store(CookieJar::new(), secure), response).into_response(),
        None => response,
    }
}

/// access_gate
///
/// Request-level checkpoint, applied to the whole router.
///
/// 1. Classify the path.
/// 2. `Login`: pass through untouched. Resolving a session here is what produces redirect
///    loops while cookies are mid-rotation.
/// 3. `ProtectedAdmin`: resolve the session; redirect to the login page when absent.
/// 4. `Public`: pass through.
///
/// Rotated tokens are written onto every outgoing response, redirects included.
pub async fn access_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let class = classify_path(request.uri().path());
    let secure = state.config.secure_cookies();

    let pending = PendingCookies::default();
    request.extensions_mut().insert(pending.clone());

    let mut rotated = None;
    match class {
        // Login is never resolved here; public paths have nothing to protect.
        PathClass::Login | PathClass::Public => {}
        PathClass::ProtectedAdmin => {
            let session =
                resolve_session(&state.identity, request.headers(), state.config.auth_timeout)
                    .await;

            if let Decision::Redirect(to) = request_decision(class, session.is_authenticated()) {
                tracing::debug!(path = %request.uri().path(), to, "request-level redirect");
                let redirect = Redirect::to(to).into_response();
                return with_cookies(redirect, session.refreshed.as_ref(), secure);
            }

            // Hand the fresh pair to the page-level check so it does not refresh a second time.
            if let Some(tokens) = &session.refreshed {
                tokens.apply_to_headers(request.headers_mut());
            }
            rotated = session.refreshed;
        }
    }

    let response = next.run(request).await;
    let rotated = pending.take().or(rotated);

    // Sign-in and sign-out write the session cookies themselves; theirs win.
    if sets_session_cookie(&response) {
        return response;
    }
    with_cookies(response, rotated.as_ref(), secure)
}

fn sets_session_cookie(response: &Response) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value.starts_with(&format!("{ACCESS_COOKIE}="))
                || value.starts_with(&format!("{REFRESH_COOKIE}="))
        })
}

/// The un-nested path of the request, as the middleware saw it.
fn request_path(parts: &Parts) -> String {
    parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string())
}

/// Runs the page-level policy for the current request.
async fn page_check<S>(parts: &Parts, state: &S) -> (Decision, SessionCheck, bool)
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    let identity = IdentityState::from_ref(state);
    let config = AppConfig::from_ref(state);

    let class = classify_path(&request_path(parts));
    let session = resolve_session(&identity, &parts.headers, config.auth_timeout).await;
    let decision = page_decision(class, session.is_authenticated());

    (decision, session, config.secure_cookies())
}

/// Builds a page-level redirect, carrying rotated tokens with it.
fn page_redirect(to: &'static str, session: &SessionCheck, secure: bool) -> Response {
    tracing::debug!(to, "page-level redirect");
    with_cookies(Redirect::to(to).into_response(), session.refreshed.as_ref(), secure)
}

/// Stashes rotated tokens for the middleware to emit.
fn stash_rotated(parts: &Parts, session: &SessionCheck) {
    if let Some(tokens) = &session.refreshed {
        match parts.extensions.get::<PendingCookies>() {
            Some(pending) => pending.put(tokens.clone()),
            None => tracing::warn!("session rotated outside the access gate; cookies not propagated"),
        }
    }
}

/// AdminSession
///
/// Page-level checkpoint for protected admin handlers. Resolves the session again,
/// independently of the middleware, and rejects with a redirect to the login page.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub user: SessionUser,
}

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (decision, session, secure) = page_check(parts, state).await;

        if let Decision::Redirect(to) = decision {
            return Err(page_redirect(to, &session, secure));
        }

        match &session.user {
            Some(user) => {
                stash_rotated(parts, &session);
                Ok(AdminSession { user: user.clone() })
            }
            // Mounted on a path the classifier does not consider protected.
            None => Err(page_redirect(LOGIN_PATH, &session, secure)),
        }
    }
}

/// GuestOnly
///
/// Page-level checkpoint for the login form: a signed-in caller is sent to the dashboard
/// instead of seeing the form again.
#[derive(Debug, Clone, Copy)]
pub struct GuestOnly;

impl<S> FromRequestParts<S> for GuestOnly
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (decision, session, secure) = page_check(parts, state).await;

        match decision {
            Decision::Redirect(to) => Err(page_redirect(to, &session, secure)),
            Decision::Allow => {
                stash_rotated(parts, &session);
                Ok(GuestOnly)
            }
        }
    }
}
