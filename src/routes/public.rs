use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints served to any visitor. Only published content leaves through here; the
/// repository filters drafts out.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /blog
        .route("/blog", get(handlers::list_posts))
        // GET /blog/{slug}
        // Rendered HTML of a single published post.
        .route("/blog/{slug}", get(handlers::get_post))
        .route("/portfolio", get(handlers::list_projects))
        .route("/ventures", get(handlers::list_ventures))
        .route("/settings", get(handlers::get_settings))
        // POST /contact
        // Stored first, then the owner is emailed.
        .route("/contact", post(handlers::submit_contact))
}
