//! Authentication middleware
//!
//! Extractors that turn an access token into a request identity. The
//! token is read from the `Authorization: Bearer` header first and from
//! the `access` cookie second.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthService, CookieManager};
use crate::error::ApiError;

/// Authenticated user extracted from a verified access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub jti: Uuid,
}

/// Extractor for authenticated users
///
/// Access tokens are stateless, so no store lookup happens here. Handlers
/// that need the user row fetch it themselves.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
        {
            Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_string(),
            Err(_) => {
                let jar = CookieJar::from_headers(&parts.headers);
                CookieManager::access_token(&jar).ok_or(ApiError::Unauthorized)?
            }
        };

        let auth_service = Arc::<AuthService>::from_ref(state);
        let claims = auth_service.verify_access(&token)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            jti: claims.jti,
        })
    }
}

/// Requires a superuser
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        let auth_service = Arc::<AuthService>::from_ref(state);
        let record = auth_service.current_user(user.user_id).await.map_err(|e| {
            tracing::debug!(user_id = %user.user_id, error = %e, "Admin lookup failed");
            ApiError::Unauthorized
        })?;

        if !record.is_superuser {
            tracing::warn!(user_id = %user.user_id, "Non-superuser attempted admin access");
            return Err(ApiError::Forbidden("Superuser access required".to_string()));
        }

        Ok(AdminUser(user))
    }
}
