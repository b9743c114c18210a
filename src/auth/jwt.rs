//! JWT token generation and validation
//!
//! Encodes and verifies the signed, expiring claims carried by access and
//! refresh tokens. The codec is a pure function of its signing secret.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    /// Bad signature, malformed input, or expired.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Wrong token type: expected {expected}, found {found}")]
    WrongType {
        expected: TokenType,
        found: TokenType,
    },
}

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims shared by access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Token type (access or refresh)
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// JWT ID, keeps tokens minted in the same second distinct
    pub jti: Uuid,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies tokens with a single HS256 secret.
///
/// Built once at startup from configuration and shared read-only.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a signed token for `subject` that expires `ttl` from now.
    ///
    /// A negative `ttl` yields an already-expired token.
    pub fn issue(
        &self,
        subject: Uuid,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject,
            token_type,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify signature, expiry and type of `token`.
    ///
    /// # Returns
    /// * `Ok(Claims)` if the token is valid and of `expected` type
    /// * `Err(JwtError::InvalidToken)` on any signature, format or expiry failure
    /// * `Err(JwtError::WrongType)` when the token is valid but of the other type
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("Token expired"),
                    kind => tracing::debug!(reason = ?kind, "Token rejected"),
                }
                JwtError::InvalidToken
            })?;

        let claims = token_data.claims;
        if claims.token_type != expected {
            return Err(JwtError::WrongType {
                expected,
                found: claims.token_type,
            });
        }

        Ok(claims)
    }
}
