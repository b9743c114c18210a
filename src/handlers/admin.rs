//! Superuser-only handlers

use axum::{extract::State, Json};

use super::AdminUser;
use crate::error::ApiResult;
use crate::models::RevokedResponse;
use crate::state::AppState;

/// DELETE /admin/refresh-tokens - Delete every refresh token
///
/// Logs every user out on their next refresh.
pub async fn purge_refresh_tokens(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<Json<RevokedResponse>> {
    tracing::warn!(admin_id = %admin.user_id, "Refresh token purge requested");
    let revoked = state.auth_service.tokens().purge_all().await?;
    Ok(Json(RevokedResponse { revoked }))
}
