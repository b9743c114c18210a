use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub version: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = match &state.db_pool {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "connected".to_string(),
            Err(e) => {
                tracing::error!(error = %e, "Health check database ping failed");
                "unreachable".to_string()
            }
        },
        None => "in-memory".to_string(),
    };

    let status = if storage == "unreachable" {
        "unhealthy"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        storage,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
