//! Authentication routes

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
        .route("/auth/password", post(auth::change_password))
        .route(
            "/auth/me",
            get(auth::get_current_user).delete(auth::delete_current_user),
        )
        .route("/auth/sessions", get(auth::list_sessions))
        .route("/auth/sessions/device", delete(auth::revoke_device))
}
