//! Authentication models for AuthVault

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Persisted refresh token
///
/// Only the hash of the raw token is kept. `replaced_by_token` and
/// `previous_token_id` are plain ids into the same table.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "token")]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub replaced_by_token: Option<Uuid>,
    pub family_id: Uuid,
    pub previous_token_id: Option<Uuid>,
    pub device_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// First token of a new family (a fresh login)
    pub fn new_family(
        user_id: Uuid,
        token_hash: String,
        ttl: Duration,
        device_info: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_at: now + ttl,
            revoked: false,
            replaced_by_token: None,
            family_id: Uuid::new_v4(),
            previous_token_id: None,
            device_info,
            created_at: now,
        }
    }

    /// Next link in this record's family
    pub fn successor(&self, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            token_hash,
            expires_at: now + ttl,
            revoked: false,
            replaced_by_token: None,
            family_id: self.family_id,
            previous_token_id: Some(self.id),
            device_info: self.device_info.clone(),
            created_at: now,
        }
    }

    /// Rotated forward or revoked; either way it must never mint again
    pub fn is_consumed(&self) -> bool {
        self.revoked || self.replaced_by_token.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_live(&self) -> bool {
        !self.is_consumed() && !self.is_expired()
    }
}

/// Raw access/refresh pair handed to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(must_match = "password")]
    pub password_again: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub public_name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_info: Option<String>,
}

/// Refresh token request; the cookie takes precedence when both are present
#[derive(Debug, Deserialize, Default)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Password change request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Revoke every session tagged with a device label
#[derive(Debug, Deserialize)]
pub struct RevokeDeviceRequest {
    pub device_info: String,
}

/// Auth tokens response
#[derive(Debug, Serialize)]
pub struct AuthTokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthTokensResponse {
    pub fn bearer(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// One live refresh token, as shown to its owner
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub family_id: Uuid,
    pub device_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<RefreshTokenRecord> for SessionResponse {
    fn from(record: RefreshTokenRecord) -> Self {
        Self {
            id: record.id,
            family_id: record.family_id,
            device_info: record.device_info,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

/// Number of records affected by a bulk revocation or purge
#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: u64,
}
