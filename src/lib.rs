use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod markdown;
pub mod models;
pub mod notify;
pub mod repository;
pub mod storage;

pub mod routes;
use routes::{admin, login, public};

// --- Public Re-exports ---

pub use auth::{IdentityState, MockIdentityProvider, SupabaseIdentity};
pub use config::AppConfig;
pub use notify::{LogNotifier, NotifierState, ResendNotifier};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockMediaStore, S3MediaStore, StorageState};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
/// The HTML login form is not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_posts, handlers::get_post, handlers::list_projects,
        handlers::list_ventures, handlers::get_settings, handlers::submit_contact,
        handlers::dashboard, handlers::admin_list_posts, handlers::admin_get_post,
        handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::preview_post, handlers::admin_list_projects, handlers::create_project,
        handlers::update_project, handlers::delete_project, handlers::admin_list_ventures,
        handlers::create_venture, handlers::update_venture, handlers::delete_venture,
        handlers::list_contacts, handlers::mark_contact, handlers::delete_contact,
        handlers::admin_get_settings, handlers::update_settings, handlers::get_presigned_url
    ),
    components(
        schemas(
            models::BlogPost, models::PortfolioProject, models::Venture,
            models::ContactSubmission, models::SiteSettings, models::CreatePostRequest,
            models::UpdatePostRequest, models::PreviewRequest, models::PreviewResponse,
            models::ProjectInput, models::VentureInput, models::ContactRequest,
            models::MarkContactRequest, models::UpdateSettingsRequest,
            models::PresignedUrlRequest, models::PresignedUrlResponse, models::RenderedPost,
            models::ContactView, models::DashboardStats, models::Dashboard,
        )
    ),
    tags(
        (name = "folio", description = "Personal site and admin API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    /// Identity provider consulted by both access checkpoints.
    pub identity: IdentityState,
    pub notifier: NotifierState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for NotifierState {
    fn from_ref(app_state: &AppState) -> NotifierState {
        app_state.notifier.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route, puts the access gate in front of all of them (unmatched
/// `/admin/*` paths included, so probing for admin URLs only ever yields a redirect), then
/// adds the observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest(
            gate::ADMIN_ROOT,
            admin::admin_routes().merge(login::login_routes()),
        )
        // Request-level checkpoint. `layer` (not `route_layer`) so the fallback is covered.
        .layer(middleware::from_fn_with_state(state.clone(), gate::access_gate))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Span for one request, tagged with its `x-request-id` so every log line correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
