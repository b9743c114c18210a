//! Token service
//!
//! Issues access/refresh pairs, rotates refresh tokens with reuse
//! detection, and revokes them.
//!
//! Each refresh token moves from issued to exactly one of consumed,
//! revoked or expired, and never comes back. Presenting a consumed or
//! revoked token again is treated as theft: every token of its owner is
//! revoked.

use std::sync::Arc;

use chrono::Duration;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{RefreshTokenRecord, TokenPair};

use super::error::AuthError;
use super::jwt::{Claims, TokenCodec, TokenType};
use super::store::{RefreshTokenStore, StoreError};

/// Token lifecycle orchestration over a codec and a store
#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    store: Arc<dyn RefreshTokenStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn RefreshTokenStore>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            store,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Issue a pair for a fresh login, starting a new token family
    pub async fn issue_pair(
        &self,
        subject: Uuid,
        device_info: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let access_token = self.codec.issue(subject, TokenType::Access, self.access_ttl)?;

        let (refresh_token, token_hash) = self.mint_refresh(subject)?;
        let record = RefreshTokenRecord::new_family(
            subject,
            token_hash,
            self.refresh_ttl,
            device_info.clone(),
        );

        let (refresh_token, record) = match self.store.put(&record).await {
            Ok(()) => (refresh_token, record),
            Err(StoreError::Conflict(detail)) => {
                tracing::warn!(user_id = %subject, detail = %detail, "Refresh token insert conflicted, retrying once");
                let (refresh_token, token_hash) = self.mint_refresh(subject)?;
                let record = RefreshTokenRecord::new_family(
                    subject,
                    token_hash,
                    self.refresh_ttl,
                    device_info,
                );
                self.store.put(&record).await?;
                (refresh_token, record)
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            user_id = %subject,
            family_id = %record.family_id,
            token_id = %record.id,
            "Issued token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a live refresh token for a new pair in the same family
    pub async fn rotate(&self, old_refresh: &str) -> Result<TokenPair, AuthError> {
        // Signature, expiry and type first; a bad token never reaches the store.
        let claims = self.codec.verify(old_refresh, TokenType::Refresh)?;

        let record = self
            .store
            .find_by_hash(&hash_token(old_refresh))
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %claims.sub, "Refresh token not found");
                AuthError::InvalidToken
            })?;

        if record.user_id != claims.sub {
            tracing::warn!(
                token_id = %record.id,
                claimed_user = %claims.sub,
                owner = %record.user_id,
                "Refresh token subject does not match its owner"
            );
            return Err(AuthError::InvalidToken);
        }

        if record.is_consumed() {
            return Err(self.reuse_detected(&record).await);
        }

        if record.is_expired() {
            tracing::debug!(token_id = %record.id, "Stored refresh token expired");
            return Err(AuthError::InvalidToken);
        }

        let access_token = self
            .codec
            .issue(record.user_id, TokenType::Access, self.access_ttl)?;

        let (refresh_token, token_hash) = self.mint_refresh(record.user_id)?;
        let successor = record.successor(token_hash, self.refresh_ttl);

        let (refresh_token, successor) =
            match self.store.mark_consumed(record.id, &successor).await {
                Ok(()) => (refresh_token, successor),
                Err(StoreError::AlreadyConsumed) => {
                    // A concurrent rotation won the race.
                    return Err(self.reuse_detected(&record).await);
                }
                Err(StoreError::Conflict(detail)) => {
                    tracing::warn!(token_id = %record.id, detail = %detail, "Successor insert conflicted, retrying once");
                    let (refresh_token, token_hash) = self.mint_refresh(record.user_id)?;
                    let successor = record.successor(token_hash, self.refresh_ttl);
                    match self.store.mark_consumed(record.id, &successor).await {
                        Ok(()) => (refresh_token, successor),
                        Err(StoreError::AlreadyConsumed) => {
                            return Err(self.reuse_detected(&record).await)
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(StoreError::NotFound) => return Err(AuthError::InvalidToken),
                Err(e) => return Err(e.into()),
            };

        tracing::info!(
            user_id = %record.user_id,
            family_id = %record.family_id,
            previous_token_id = %record.id,
            token_id = %successor.id,
            "Rotated refresh token"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Revoke refresh tokens of `subject`
    ///
    /// With a token, only that record is revoked, and only if `subject` owns
    /// it. Without one, every record of `subject` is revoked. Returns the
    /// number of records that changed.
    pub async fn revoke(&self, subject: Uuid, token: Option<&str>) -> Result<u64, AuthError> {
        match token {
            Some(raw) => {
                let record = self
                    .store
                    .find_by_hash(&hash_token(raw))
                    .await?
                    .filter(|r| r.user_id == subject)
                    .ok_or(AuthError::InvalidToken)?;

                let changed = self.store.revoke(record.id).await?;
                tracing::info!(
                    user_id = %subject,
                    token_id = %record.id,
                    family_id = %record.family_id,
                    "Revoked refresh token"
                );
                Ok(u64::from(changed))
            }
            None => {
                let count = self.store.revoke_all(subject).await?;
                tracing::info!(user_id = %subject, revoked = count, "Revoked all refresh tokens");
                Ok(count)
            }
        }
    }

    /// Revoke every token of `subject` tagged with `device_info`
    pub async fn revoke_device(&self, subject: Uuid, device_info: &str) -> Result<u64, AuthError> {
        let count = self.store.revoke_device(subject, device_info).await?;
        tracing::info!(user_id = %subject, device_info = %device_info, revoked = count, "Revoked device tokens");
        Ok(count)
    }

    /// Live refresh tokens of `subject`, newest first
    pub async fn active_sessions(
        &self,
        subject: Uuid,
    ) -> Result<Vec<RefreshTokenRecord>, AuthError> {
        Ok(self.store.list_active(subject).await?)
    }

    /// Verify a stateless access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.codec.verify(token, TokenType::Access)?)
    }

    /// Verify signature, expiry and type of a refresh token without
    /// consulting the store
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.codec.verify(token, TokenType::Refresh)?)
    }

    /// Delete every refresh token in the system
    pub async fn purge_all(&self) -> Result<u64, AuthError> {
        let count = self.store.purge_all().await.map_err(|e| {
            tracing::error!(error = %e, "Refresh token purge failed");
            e
        })?;
        tracing::warn!(purged = count, "All refresh tokens purged");
        Ok(count)
    }

    /// Raw refresh token and the hash that gets stored for it
    fn mint_refresh(&self, subject: Uuid) -> Result<(String, String), AuthError> {
        let token = self
            .codec
            .issue(subject, TokenType::Refresh, self.refresh_ttl)?;
        let token_hash = hash_token(&token);
        Ok((token, token_hash))
    }

    async fn reuse_detected(&self, record: &RefreshTokenRecord) -> AuthError {
        tracing::error!(
            user_id = %record.user_id,
            family_id = %record.family_id,
            token_id = %record.id,
            revoked = record.revoked,
            replaced_by = ?record.replaced_by_token,
            "Refresh token reuse detected, revoking all sessions"
        );

        match self.store.revoke_all(record.user_id).await {
            Ok(count) => {
                tracing::warn!(user_id = %record.user_id, revoked = count, "Sessions revoked after token reuse");
                AuthError::TokenReuseDetected
            }
            Err(e) => {
                tracing::error!(user_id = %record.user_id, error = %e, "Failed to revoke sessions after token reuse");
                e.into()
            }
        }
    }
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
