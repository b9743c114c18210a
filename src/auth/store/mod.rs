//! Persistence boundary for users and refresh tokens
//!
//! The token and auth services only ever talk to these traits. Two
//! implementations ship: PostgreSQL for deployments and an in-memory map
//! for tests and database-less local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{RefreshTokenRecord, User};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The record was already rotated forward or revoked.
    #[error("Refresh token already consumed")]
    AlreadyConsumed,

    #[error("Record not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound,
            _ => StoreError::Storage(e.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Storage(e.to_string())
    }
}

/// Durable home of refresh token records
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a new record; `Conflict` on duplicate id or hash.
    async fn put(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    /// Equality lookup on the stored hash.
    async fn find_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Persist `successor` and point `record_id` at it, all or nothing.
    ///
    /// Fails with `AlreadyConsumed`, writing nothing, when `record_id` is no
    /// longer live. Concurrent calls for the same record serialize here.
    async fn mark_consumed(
        &self,
        record_id: Uuid,
        successor: &RefreshTokenRecord,
    ) -> Result<(), StoreError>;

    /// Revoke one record. Returns whether it was live before.
    async fn revoke(&self, record_id: Uuid) -> Result<bool, StoreError>;

    /// Revoke every record owned by `user_id`. Returns how many changed.
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn revoke_device(&self, user_id: Uuid, device_info: &str) -> Result<u64, StoreError>;

    /// Unconsumed, unexpired records of `user_id`, newest first.
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    /// Delete every record. Irreversible.
    async fn purge_all(&self) -> Result<u64, StoreError>;
}

/// Durable home of user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; `Conflict` on duplicate username.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn set_superuser(&self, id: Uuid, is_superuser: bool) -> Result<(), StoreError>;

    /// Delete a user together with all of its refresh tokens.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
