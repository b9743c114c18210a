use axum::{routing::delete, Router};

use crate::handlers::admin;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new().route(
        "/admin/refresh-tokens",
        delete(admin::purge_refresh_tokens),
    )
}
