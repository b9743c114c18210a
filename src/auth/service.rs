//! Authentication service
//!
//! Ties credential checks and the token service together for the
//! register, login, refresh and logout use cases.

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::models::{ChangePasswordRequest, RegisterRequest, TokenPair, User};

use super::error::AuthError;
use super::jwt::Claims;
use super::password::{hash_password, verify_password};
use super::store::{StoreError, UserStore};
use super::tokens::TokenService;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    bcrypt_cost: u32,
    superusers: Vec<String>,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService, bcrypt_cost: u32) -> Self {
        Self {
            users,
            tokens,
            bcrypt_cost,
            superusers: Vec::new(),
        }
    }

    /// Usernames that are superusers as soon as they exist
    pub fn with_superusers(mut self, usernames: Vec<String>) -> Self {
        self.superusers = usernames;
        self
    }

    /// Token service (for session listing and administration)
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an account
    pub async fn register(&self, req: RegisterRequest) -> Result<User, AuthError> {
        req.validate()?;

        let password_hash = hash_password(&req.password, self.bcrypt_cost)?;
        let mut user = User::new(req.username, password_hash, req.email, req.public_name);
        user.is_superuser = self.superusers.contains(&user.username);

        self.users.create(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => AuthError::UserAlreadyExists,
            other => other.into(),
        })?;

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            is_superuser = user.is_superuser,
            "User registered"
        );
        Ok(user)
    }

    /// Check a username/password and start a new session
    ///
    /// Unknown user, inactive user and wrong password are indistinguishable
    /// to the caller.
    pub async fn authenticate(
        &self,
        username: &str,
        secret: &str,
        device_info: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let user = match self.users.find_by_username(username).await? {
            Some(user) if user.is_active => user,
            Some(user) => {
                tracing::info!(user_id = %user.id, "Login attempt for inactive user");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                tracing::info!("Login attempt for unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(&user.password_hash, secret)? {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.tokens.issue_pair(user.id, device_info).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }

    /// Rotate a refresh token into a new pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.tokens.rotate(refresh_token).await
    }

    /// End the session bound to `refresh_token`, or all sessions without one
    pub async fn logout(
        &self,
        subject: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<u64, AuthError> {
        self.tokens.revoke(subject, refresh_token).await
    }

    /// End the session bound to `refresh_token` when no access token is at
    /// hand; the refresh token's own subject is the owner checked against.
    pub async fn logout_with_refresh(&self, refresh_token: &str) -> Result<u64, AuthError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        self.tokens.revoke(claims.sub, Some(refresh_token)).await
    }

    /// Revoke every session of `subject`
    pub async fn logout_all(&self, subject: Uuid) -> Result<u64, AuthError> {
        self.tokens.revoke(subject, None).await
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify_access(token)
    }

    /// Replace the password hash and end every existing session
    pub async fn change_password(
        &self,
        subject: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        req.validate()?;

        let user = self.current_user(subject).await?;
        if !verify_password(&user.password_hash, &req.current_password)? {
            tracing::info!(user_id = %subject, "Password change rejected: wrong current password");
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_password(&req.new_password, self.bcrypt_cost)?;
        self.users
            .update_password(subject, &password_hash)
            .await
            .map_err(not_found_as_user)?;

        let revoked = self.tokens.revoke(subject, None).await?;
        tracing::info!(user_id = %subject, revoked = revoked, "Password changed");
        Ok(())
    }

    /// Get a user by ID
    pub async fn current_user(&self, subject: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(subject)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn set_superuser(&self, subject: Uuid, is_superuser: bool) -> Result<(), AuthError> {
        self.users
            .set_superuser(subject, is_superuser)
            .await
            .map_err(not_found_as_user)?;
        tracing::warn!(user_id = %subject, is_superuser = is_superuser, "Superuser flag changed");
        Ok(())
    }

    /// Grant superuser to configured usernames that already exist
    ///
    /// Returns how many accounts were promoted.
    pub async fn promote_superusers(&self) -> Result<usize, AuthError> {
        let mut promoted = 0;
        for username in &self.superusers {
            match self.users.find_by_username(username).await? {
                Some(user) if !user.is_superuser => {
                    self.set_superuser(user.id, true).await?;
                    promoted += 1;
                }
                Some(_) => {}
                None => {
                    tracing::debug!(username = %username, "Configured superuser not registered yet");
                }
            }
        }
        Ok(promoted)
    }

    /// Delete a user and, with it, all of its refresh tokens
    pub async fn delete_user(&self, subject: Uuid) -> Result<(), AuthError> {
        self.users.delete(subject).await.map_err(not_found_as_user)?;
        tracing::warn!(user_id = %subject, "User deleted");
        Ok(())
    }
}

fn not_found_as_user(e: StoreError) -> AuthError {
    match e {
        StoreError::NotFound => AuthError::UserNotFound,
        other => other.into(),
    }
}
