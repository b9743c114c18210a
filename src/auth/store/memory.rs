//! In-memory store
//!
//! Every mutation takes the single write lock, which gives the same
//! all-or-nothing behaviour the PostgreSQL store gets from transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RefreshTokenStore, StoreError, UserStore};
use crate::models::{RefreshTokenRecord, User};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    usernames: HashMap<String, Uuid>,
    tokens: HashMap<Uuid, RefreshTokenRecord>,
    token_hashes: HashMap<String, Uuid>,
}

impl State {
    fn insert_token(&mut self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        if self.tokens.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!(
                "refresh token id {} already exists",
                record.id
            )));
        }
        if self.token_hashes.contains_key(&record.token_hash) {
            return Err(StoreError::Conflict(
                "refresh token hash already exists".to_string(),
            ));
        }
        self.token_hashes
            .insert(record.token_hash.clone(), record.id);
        self.tokens.insert(record.id, record.clone());
        Ok(())
    }
}

/// Map-backed implementation of both store traits
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a refresh token by id
    pub async fn token(&self, id: Uuid) -> Option<RefreshTokenRecord> {
        self.state.read().await.tokens.get(&id).cloned()
    }

    /// Every stored record of a family, oldest first
    pub async fn family(&self, family_id: Uuid) -> Vec<RefreshTokenRecord> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state
            .tokens
            .values()
            .filter(|r| r.family_id == family_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn put(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&record.user_id) {
            return Err(StoreError::Storage(format!(
                "unknown user {} for refresh token",
                record.user_id
            )));
        }
        state.insert_token(record)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .token_hashes
            .get(token_hash)
            .and_then(|id| state.tokens.get(id))
            .cloned())
    }

    async fn mark_consumed(
        &self,
        record_id: Uuid,
        successor: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        match state.tokens.get(&record_id) {
            None => return Err(StoreError::NotFound),
            Some(record) if record.is_consumed() => return Err(StoreError::AlreadyConsumed),
            Some(_) => {}
        }

        state.insert_token(successor)?;
        if let Some(record) = state.tokens.get_mut(&record_id) {
            record.replaced_by_token = Some(successor.id);
        }
        Ok(())
    }

    async fn revoke(&self, record_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .tokens
            .get_mut(&record_id)
            .ok_or(StoreError::NotFound)?;
        let was_live = !record.revoked;
        record.revoked = true;
        Ok(was_live)
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for record in state
            .tokens
            .values_mut()
            .filter(|r| r.user_id == user_id && !r.revoked)
        {
            record.revoked = true;
            count += 1;
        }
        Ok(count)
    }

    async fn revoke_device(&self, user_id: Uuid, device_info: &str) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for record in state.tokens.values_mut().filter(|r| {
            r.user_id == user_id && !r.revoked && r.device_info.as_deref() == Some(device_info)
        }) {
            record.revoked = true;
            count += 1;
        }
        Ok(count)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let state = self.state.read().await;
        let now = Utc::now();
        let mut records: Vec<_> = state
            .tokens
            .values()
            .filter(|r| r.user_id == user_id && !r.is_consumed() && r.expires_at > now)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn purge_all(&self) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let count = state.tokens.len() as u64;
        state.tokens.clear();
        state.token_hashes.clear();
        Ok(count)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.usernames.contains_key(&user.username) || state.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!(
                "user {} already exists",
                user.username
            )));
        }
        state.usernames.insert(user.username.clone(), user.id);
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_superuser(&self, id: Uuid, is_superuser: bool) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_superuser = is_superuser;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let user = state.users.remove(&id).ok_or(StoreError::NotFound)?;
        state.usernames.remove(&user.username);

        let owned: Vec<Uuid> = state
            .tokens
            .values()
            .filter(|r| r.user_id == id)
            .map(|r| r.id)
            .collect();
        for token_id in owned {
            if let Some(record) = state.tokens.remove(&token_id) {
                state.token_hashes.remove(&record.token_hash);
            }
        }
        Ok(())
    }
}
