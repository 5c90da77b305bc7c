use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;

/// Cookie carrying the short-lived access token (a signed JWT).
pub const ACCESS_COOKIE: &str = "sb-access-token";
/// Cookie carrying the long-lived, single-use refresh token.
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

/// Audience the identity provider stamps on user access tokens.
const TOKEN_AUDIENCE: &str = "authenticated";

/// Claims
///
/// Payload of an access token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID.
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// The identity a valid session resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

/// SessionTokens
///
/// The access/refresh token pair that makes up a session. Rotated on refresh; whenever a
/// new pair is issued it must reach the client through `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionTokens {
    /// Reads the pair from an inbound cookie jar. Both halves must be present.
    pub fn from_jar(jar: &CookieJar) -> Option<Self> {
        Some(Self {
            access_token: jar.get(ACCESS_COOKIE)?.value().to_string(),
            refresh_token: jar.get(REFRESH_COOKIE)?.value().to_string(),
        })
    }

    /// Adds both session cookies to `jar`, marking them as changed so they are emitted.
    pub fn store(&self, jar: CookieJar, secure: bool) -> CookieJar {
        jar.add(session_cookie(ACCESS_COOKIE, self.access_token.clone(), secure))
            .add(session_cookie(REFRESH_COOKIE, self.refresh_token.clone(), secure))
    }

    /// Rewrites the inbound `Cookie` header so downstream extractors read this pair.
    pub fn apply_to_headers(&self, headers: &mut HeaderMap) {
        let jar = CookieJar::from_headers(headers)
            .add(Cookie::new(ACCESS_COOKIE, self.access_token.clone()))
            .add(Cookie::new(REFRESH_COOKIE, self.refresh_token.clone()));

        let raw = jar
            .iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; ");

        headers.remove(header::COOKIE);
        if let Ok(value) = HeaderValue::from_str(&raw) {
            headers.insert(header::COOKIE, value);
        }
    }
}

/// Removes both session cookies (sign-out).
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Resolution
///
/// Outcome of asking the identity provider who the caller is. `refreshed` is set whenever
/// the provider rotated the token pair while answering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub user: Option<SessionUser>,
    pub refreshed: Option<SessionTokens>,
}

impl Resolution {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: SessionUser) -> Self {
        Self {
            user: Some(user),
            refreshed: None,
        }
    }
}

/// Result of a successful password sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: SessionUser,
    pub tokens: SessionTokens,
}

/// AuthError
///
/// Failures talking to the identity provider. The access gate never surfaces these to the
/// client; they degrade to "unauthenticated".
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider returned {0}")]
    Rejected(StatusCode),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("identity provider timed out")]
    Timeout,

    #[error("simulated identity provider failure")]
    Simulated,
}

/// IdentityProvider
///
/// Seam to the external identity service. Swappable between the real Supabase client and
/// `MockIdentityProvider` without touching the gate.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves the caller's session from request cookies, refreshing it if needed.
    async fn get_user(&self, cookies: &CookieJar) -> Result<Resolution, AuthError>;

    /// Exchanges credentials for a fresh session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError>;

    /// Revokes the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

/// IdentityState
///
/// The concrete type used to share the identity provider across the application state.
pub type IdentityState = Arc<dyn IdentityProvider>;

/// SupabaseIdentity
///
/// Verifies access tokens locally with the project's JWT secret and falls back to the
/// provider's token endpoint when the access token is missing or expired.
#[derive(Clone)]
pub struct SupabaseIdentity {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    decoding_key: DecodingKey,
}

/// Token grant response from `/auth/v1/token`.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user: ProviderUser,
}

/// Outcome of verifying an access token locally. A missing token counts as expired.
enum TokenCheck {
    Valid(SessionUser),
    Expired,
    Invalid,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseIdentity {
    pub fn new(config: &AppConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.auth_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        })
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation
    }

    fn verify(&self, token: &str) -> TokenCheck {
        match decode::<Claims>(token, &self.decoding_key, &Self::validation()) {
            Ok(data) => TokenCheck::Valid(SessionUser {
                id: data.claims.sub,
                email: data.claims.email.unwrap_or_default(),
            }),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => TokenCheck::Expired,
                _ => {
                    tracing::debug!(error = %e, "rejected access token");
                    TokenCheck::Invalid
                }
            },
        }
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status));
        }

        Ok(response.json::<TokenResponse>().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Resolution, AuthError> {
        match self
            .grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(granted) => Ok(Resolution {
                user: Some(SessionUser {
                    id: granted.user.id,
                    email: granted.user.email.unwrap_or_default(),
                }),
                refreshed: Some(SessionTokens {
                    access_token: granted.access_token,
                    refresh_token: granted.refresh_token,
                }),
            }),
            // A revoked or already-used refresh token is an ordinary logged-out state.
            Err(AuthError::Rejected(status)) if status.is_client_error() => {
                Ok(Resolution::anonymous())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn get_user(&self, cookies: &CookieJar) -> Result<Resolution, AuthError> {
        let access = cookies.get(ACCESS_COOKIE).map(|c| c.value().to_string());
        let refresh = cookies.get(REFRESH_COOKIE).map(|c| c.value().to_string());

        let check = match access.as_deref() {
            Some(token) => self.verify(token),
            None => TokenCheck::Expired,
        };

        match (check, refresh) {
            (TokenCheck::Valid(user), _) => Ok(Resolution::authenticated(user)),
            (TokenCheck::Expired, Some(refresh_token)) if !refresh_token.is_empty() => {
                self.refresh(&refresh_token).await
            }
            _ => Ok(Resolution::anonymous()),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let granted = self
            .grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await
            .map_err(|e| match e {
                AuthError::Rejected(StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) => {
                    AuthError::InvalidCredentials
                }
                other => other,
            })?;

        Ok(SignedIn {
            user: SessionUser {
                id: granted.user.id,
                email: granted.user.email.unwrap_or_else(|| email.to_string()),
            },
            tokens: SessionTokens {
                access_token: granted.access_token,
                refresh_token: granted.refresh_token,
            },
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AuthError::Rejected(status))
        }
    }
}

/// MockIdentityProvider
///
/// Deterministic identity provider for tests and offline runs. The outcome is fixed at
/// construction; `calls()` counts `get_user` invocations.
pub struct MockIdentityProvider {
    behavior: MockBehavior,
    password: String,
    calls: AtomicUsize,
}

#[derive(Clone)]
enum MockBehavior {
    Anonymous,
    Authenticated(SessionUser),
    Refreshing(SessionUser, SessionTokens),
    Failing,
    Slow(Duration),
}

impl MockIdentityProvider {
    fn with(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            password: "correct horse battery staple".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every caller is logged out.
    pub fn anonymous() -> Self {
        Self::with(MockBehavior::Anonymous)
    }

    /// Every caller resolves to `user`.
    pub fn authenticated(user: SessionUser) -> Self {
        Self::with(MockBehavior::Authenticated(user))
    }

    /// Every caller resolves to `user`, and the provider rotates the pair to `tokens`.
    pub fn refreshing(user: SessionUser, tokens: SessionTokens) -> Self {
        Self::with(MockBehavior::Refreshing(user, tokens))
    }

    /// Every lookup fails as if the provider were down.
    pub fn failing() -> Self {
        Self::with(MockBehavior::Failing)
    }

    /// Every lookup stalls for `delay` before reporting anonymous.
    pub fn slow(delay: Duration) -> Self {
        Self::with(MockBehavior::Slow(delay))
    }

    /// The password `sign_in` accepts.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_user(&self, _cookies: &CookieJar) -> Result<Resolution, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Anonymous => Ok(Resolution::anonymous()),
            MockBehavior::Authenticated(user) => Ok(Resolution::authenticated(user.clone())),
            MockBehavior::Refreshing(user, tokens) => Ok(Resolution {
                user: Some(user.clone()),
                refreshed: Some(tokens.clone()),
            }),
            MockBehavior::Failing => Err(AuthError::Simulated),
            MockBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Resolution::anonymous())
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        if matches!(self.behavior, MockBehavior::Failing) {
            return Err(AuthError::Simulated);
        }
        if password != self.password {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(SignedIn {
            user: SessionUser {
                id: Uuid::new_v4(),
                email: email.to_string(),
            },
            tokens: SessionTokens {
                access_token: "mock-access-token".to_string(),
                refresh_token: "mock-refresh-token".to_string(),
            },
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        match self.behavior {
            MockBehavior::Failing => Err(AuthError::Simulated),
            _ => Ok(()),
        }
    }
}
