//! AuthVault Server
//!
//! HTTP front end for password login and refresh-token rotation. Runs
//! against PostgreSQL when `DATABASE_URL` is set, otherwise against an
//! in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use authvault_server::auth::{
    AuthService, CookieManager, InMemoryStore, PgStore, RefreshTokenStore, TokenCodec,
    TokenService, UserStore,
};
use authvault_server::config::Config;
use authvault_server::middleware;
use authvault_server::routes;
use authvault_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = %config.environment.as_str(), "Starting AuthVault");

    let (users, tokens, db_pool) = match &config.database_url {
        Some(database_url) => {
            tracing::info!(
                url = %config.database_url_masked().unwrap_or_default(),
                "Connecting to database..."
            );
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_seconds))
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;

            let store = Arc::new(PgStore::new(pool.clone()));
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Database connected and migrated");

            (
                store.clone() as Arc<dyn UserStore>,
                store as Arc<dyn RefreshTokenStore>,
                Some(pool),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            let store = Arc::new(InMemoryStore::new());
            (
                store.clone() as Arc<dyn UserStore>,
                store as Arc<dyn RefreshTokenStore>,
                None,
            )
        }
    };

    let token_service = TokenService::new(
        TokenCodec::new(&config.jwt_secret),
        tokens,
        config.access_token_ttl(),
        config.refresh_token_ttl(),
    );
    let auth_service = Arc::new(
        AuthService::new(users, token_service, config.bcrypt_cost)
            .with_superusers(config.superuser_usernames.clone()),
    );
    let promoted = auth_service
        .promote_superusers()
        .await
        .context("Failed to promote configured superusers")?;
    if promoted > 0 {
        tracing::info!(promoted = promoted, "Promoted configured superusers");
    }
    let cookies = CookieManager::new(
        config.environment.is_production(),
        config.access_token_ttl(),
        config.refresh_token_ttl(),
    );

    let app_state = AppState::new(auth_service, cookies, db_pool);

    let mut app = routes::app_router(app_state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_seconds,
        )))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// CORS for cookie-bearing requests
///
/// Credentials cannot be combined with a wildcard origin, so without an
/// explicit list no cross-origin access is granted.
fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, cross-origin requests are rejected");
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
