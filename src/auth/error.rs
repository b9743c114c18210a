//! Auth service errors

use thiserror::Error;

use super::jwt::JwtError;
use super::password::PasswordError;
use super::store::StoreError;

/// Errors surfaced by the token and auth services
///
/// `InvalidCredentials` and `InvalidToken` carry no cause.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Refresh token reuse detected")]
    TokenReuseDetected,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Password verifier fault: {0}")]
    VerifierFault(String),
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::EncodingFailed(detail) => AuthError::TokenError(detail),
            JwtError::InvalidToken | JwtError::WrongType { .. } => {
                tracing::debug!(error = %e, "Token verification failed");
                AuthError::InvalidToken
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(detail) => AuthError::Conflict(detail),
            other => AuthError::Storage(other.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::VerifierFault(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(e: validator::ValidationErrors) -> Self {
        AuthError::Validation(e.to_string())
    }
}
