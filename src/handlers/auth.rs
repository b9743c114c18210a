//! Authentication HTTP handlers
//!
//! Endpoints for password login and the refresh-token lifecycle. Tokens
//! are returned in the JSON body and also set as cookies.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;

use super::AuthenticatedUser;
use crate::auth::{AuthError, CookieManager};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthTokensResponse, ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    RevokeDeviceRequest, RevokedResponse, SessionResponse, UserResponse,
};
use crate::state::AppState;

/// Refresh token from the cookie, falling back to the JSON body
fn presented_refresh_token(
    jar: &CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> Option<String> {
    CookieManager::refresh_token(jar).or_else(|| {
        body.and_then(|Json(req)| req.refresh_token)
            .filter(|t| !t.is_empty())
    })
}

/// POST /auth/register - Create an account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = state.auth_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /auth/login - Check credentials and issue a token pair
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthTokensResponse>)> {
    let pair = state
        .auth_service
        .authenticate(&req.username, &req.password, req.device_info)
        .await?;

    let jar = state.cookies.set_auth_cookies(jar, &pair);
    Ok((
        jar,
        Json(AuthTokensResponse::bearer(pair, state.access_expires_in())),
    ))
}

/// POST /auth/refresh - Rotate the refresh token
///
/// On failure the auth cookies are cleared so the client stops presenting
/// a dead token.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> Result<(CookieJar, Json<AuthTokensResponse>), (CookieJar, ApiError)> {
    let Some(raw) = presented_refresh_token(&jar, body) else {
        return Err((state.cookies.clear_auth_cookies(jar), ApiError::Unauthorized));
    };

    match state.auth_service.refresh(&raw).await {
        Ok(pair) => {
            let jar = state.cookies.set_auth_cookies(jar, &pair);
            Ok((
                jar,
                Json(AuthTokensResponse::bearer(pair, state.access_expires_in())),
            ))
        }
        Err(e) => Err((state.cookies.clear_auth_cookies(jar), e.into())),
    }
}

/// POST /auth/logout - Revoke the presented refresh token
///
/// The owner is taken from the access token when one is valid, otherwise
/// from the refresh token itself. Cookies are cleared even when revocation
/// fails.
pub async fn logout(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> (CookieJar, StatusCode) {
    let Some(raw) = presented_refresh_token(&jar, body) else {
        tracing::debug!("Logout without refresh token");
        return (state.cookies.clear_auth_cookies(jar), StatusCode::NO_CONTENT);
    };

    let result = match &user {
        Some(user) => state.auth_service.logout(user.user_id, Some(&raw)).await,
        None => state.auth_service.logout_with_refresh(&raw).await,
    };

    match result {
        Ok(revoked) => {
            tracing::info!(user_id = ?user.map(|u| u.user_id), revoked = revoked, "Logged out");
        }
        Err(AuthError::InvalidToken) => {
            tracing::info!("Logout with unknown or expired refresh token");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    (state.cookies.clear_auth_cookies(jar), StatusCode::NO_CONTENT)
}

/// POST /auth/logout-all - Revoke all sessions for the current user
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<RevokedResponse>)> {
    let revoked = state.auth_service.logout_all(user.user_id).await?;
    Ok((
        state.cookies.clear_auth_cookies(jar),
        Json(RevokedResponse { revoked }),
    ))
}

/// POST /auth/password - Change password; ends every session
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<(CookieJar, StatusCode)> {
    state
        .auth_service
        .change_password(user.user_id, req)
        .await?;
    Ok((state.cookies.clear_auth_cookies(jar), StatusCode::NO_CONTENT))
}

/// GET /auth/me - Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<UserResponse>> {
    let user = state.auth_service.current_user(user.user_id).await?;
    Ok(Json(user.into()))
}

/// DELETE /auth/me - Delete the current account and its tokens
pub async fn delete_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, StatusCode)> {
    state.auth_service.delete_user(user.user_id).await?;
    Ok((state.cookies.clear_auth_cookies(jar), StatusCode::NO_CONTENT))
}

/// GET /auth/sessions - List live refresh tokens
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let sessions = state
        .auth_service
        .tokens()
        .active_sessions(user.user_id)
        .await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// DELETE /auth/sessions/device - Revoke every token issued to a device
pub async fn revoke_device(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<RevokeDeviceRequest>,
) -> ApiResult<Json<RevokedResponse>> {
    if req.device_info.trim().is_empty() {
        return Err(ApiError::BadRequest("device_info must not be empty".to_string()));
    }

    let revoked = state
        .auth_service
        .tokens()
        .revoke_device(user.user_id, &req.device_info)
        .await?;
    Ok(Json(RevokedResponse { revoked }))
}
