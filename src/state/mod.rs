//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::{AuthService, CookieManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub cookies: CookieManager,
    /// Present when running against PostgreSQL; used by the health check
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        cookies: CookieManager,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            auth_service,
            cookies,
            db_pool,
        }
    }

    /// Lifetime of an access token in seconds, as reported to clients
    pub fn access_expires_in(&self) -> i64 {
        self.auth_service.tokens().access_ttl().num_seconds()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for CookieManager {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.cookies.clone()
    }
}
