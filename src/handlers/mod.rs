//! API handlers for AuthVault

pub mod admin;
pub mod auth;
pub mod health;

pub use admin::*;
pub use auth::*;
pub use health::*;

// Re-export the auth extractors for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser};
