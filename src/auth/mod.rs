//! Authentication module for AuthVault
//!
//! Provides password-based authentication with rotating refresh tokens.
//! - Credential verification with bcrypt
//! - JWT access/refresh token issuance and validation
//! - Refresh token rotation with reuse detection
//! - Cookie transport for both tokens

pub mod cookies;
mod error;
pub mod jwt;
pub mod password;
mod service;
pub mod store;
mod tokens;

pub use cookies::CookieManager;
pub use error::AuthError;
pub use jwt::{Claims, JwtError, TokenCodec, TokenType};
pub use service::AuthService;
pub use store::{InMemoryStore, PgStore, RefreshTokenStore, StoreError, UserStore};
pub use tokens::{hash_token, TokenService};
