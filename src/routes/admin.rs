use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Content management for the site owner, nested under `/admin`.
///
/// Access Control:
/// The access gate middleware redirects anonymous requests before they get here. Each
/// handler still takes an `AdminSession`, so a route mounted without the middleware is
/// never left open.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Dashboard counters.
        .route("/", get(handlers::dashboard))
        // POST /admin/logout
        .route("/logout", post(handlers::logout))
        // --- Blog ---
        // Drafts included. Posts are addressed by id here, by slug on the public side.
        .route(
            "/blog",
            get(handlers::admin_list_posts).post(handlers::create_post),
        )
        // POST /admin/blog/preview
        // Renders unsaved Markdown with the same renderer readers get.
        .route("/blog/preview", post(handlers::preview_post))
        .route(
            "/blog/{id}",
            get(handlers::admin_get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        // --- Showcase ---
        .route(
            "/portfolio",
            get(handlers::admin_list_projects).post(handlers::create_project),
        )
        .route(
            "/portfolio/{id}",
            put(handlers::update_project).delete(handlers::delete_project),
        )
        .route(
            "/ventures",
            get(handlers::admin_list_ventures).post(handlers::create_venture),
        )
        .route(
            "/ventures/{id}",
            put(handlers::update_venture).delete(handlers::delete_venture),
        )
        // --- Inbox ---
        .route("/contacts", get(handlers::list_contacts))
        .route(
            "/contacts/{id}",
            axum::routing::patch(handlers::mark_contact).delete(handlers::delete_contact),
        )
        // --- Site ---
        .route(
            "/settings",
            get(handlers::admin_get_settings).put(handlers::update_settings),
        )
        // POST /admin/upload/presigned
        // Short-lived direct-to-storage URL for an image upload.
        .route("/upload/presigned", post(handlers::get_presigned_url))
}
