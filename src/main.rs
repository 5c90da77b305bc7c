use folio_backend::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    auth::SupabaseIdentity,
    notify::{LogNotifier, NotifierState, ResendNotifier},
    repository::{PostgresRepository, RepositoryState},
    storage::{MediaStore, S3MediaStore, StorageState},
    IdentityState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Wires configuration, logging, database, identity, storage and email together and
/// serves the router. Any failure here is fatal: the server does not start half-configured.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty for humans locally, JSON for the log pipeline in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "folio_backend=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database + schema
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Identity provider
    let identity = Arc::new(
        SupabaseIdentity::new(&config).expect("FATAL: Failed to build identity provider client."),
    ) as IdentityState;

    // 5. Object storage
    let media = S3MediaStore::from_config(&config);
    if config.env == Env::Local {
        media.ensure_bucket().await;
    }
    let storage = Arc::new(media) as StorageState;

    // 6. Contact notifications
    let notifier: NotifierState = match &config.resend_api_key {
        Some(api_key) => Arc::new(
            ResendNotifier::new(
                &config.resend_api_url,
                api_key,
                &config.contact_from_email,
                &config.contact_notify_email,
            )
            .expect("FATAL: Failed to build email client."),
        ),
        None => {
            tracing::warn!("RESEND_API_KEY not set; contact notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    // 7. Serve
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        identity,
        notifier,
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {bind_addr}: {e}"));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await.unwrap();
}
