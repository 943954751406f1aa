use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod links;
mod models;
mod shortcode;
mod test_utils;

use auth::TokenKeys;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: config::AppConfig,
    /// Signs tokens at register/login and verifies them in `AuthUser`.
    pub keys: TokenKeys,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; real env vars win
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snip=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = config::AppConfig::from_env()?;
    tracing::info!(
        "Starting snip on {} ({})",
        config.bind_addr(),
        config.environment.as_str()
    );
    tracing::info!("Base URL: {}", config.base_url);

    let db = db::connect(&config.database_url).await?;
    tracing::info!("Database migrations applied");

    let keys = TokenKeys::new(config.jwt_secret.as_bytes(), config.token_ttl_days);
    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState { db, config, keys });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    let auth_router = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let urls_router = Router::new()
        .route(
            "/",
            post(handlers::urls::create_url).get(handlers::urls::list_urls),
        )
        .route("/:id", delete(handlers::urls::delete_url));

    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .route("/", get(handlers::health::index))
        .route("/health", get(handlers::health::health))
        .nest("/api/auth", auth_router)
        .nest("/api/urls", urls_router)
        // Public short-link redirect. Static routes above take priority
        .route("/:code", get(handlers::redirect::redirect))
        .fallback(handlers::health::not_found)
        .layer(middleware::map_response_with_state(
            state.clone(),
            error::expose_error_detail,
        ))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!("FRONTEND_URL '{}' is not a valid origin; CORS disabled", frontend_url);
            layer
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
