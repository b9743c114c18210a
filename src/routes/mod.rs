//! Route definitions for AuthVault

mod admin;
mod auth;

use axum::{routing::get, Router};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

pub use admin::admin_routes;
pub use auth::auth_routes;

/// Full application router with the per-request middleware applied
///
/// Transport concerns (CORS, timeouts, HSTS) are layered on by the binary.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(auth_routes())
        .merge(admin_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
