use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Login Router Module
///
/// Mounted under `/admin`. The access gate lets this path through without resolving a
/// session; the `GuestOnly` extractor on the form bounces callers who are already signed in.
pub fn login_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/login    sign-in form, optional ?error=invalid|unavailable
        // POST /admin/login   credential exchange, sets the session cookies
        .route("/login", get(handlers::login_page).post(handlers::login))
}
