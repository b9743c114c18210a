//! Configuration management for AuthVault
//!
//! Loads and validates configuration from environment variables, with
//! support for different environments (development, staging, production).

use std::env;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub db_acquire_timeout_seconds: u64,

    /// Upper bound on a single request, store calls included
    pub request_timeout_seconds: u64,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for token signing
    pub jwt_secret: String,

    /// Access token TTL in minutes (default: 30)
    pub jwt_access_token_ttl_minutes: i64,

    /// Refresh token TTL in days (default: 7)
    pub jwt_refresh_token_ttl_days: i64,

    /// bcrypt work factor for new password hashes
    pub bcrypt_cost: u32,

    /// Usernames granted superuser on registration and at startup
    pub superuser_usernames: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| s.parse::<Environment>())
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 5);
        let db_acquire_timeout_seconds = parse_or("DB_ACQUIRE_TIMEOUT_SECONDS", 5);
        let request_timeout_seconds = parse_or("REQUEST_TIMEOUT_SECONDS", 15);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let jwt_access_token_ttl_minutes = check_ttl(
            "JWT_ACCESS_TOKEN_TTL_MINUTES",
            parse_or("JWT_ACCESS_TOKEN_TTL_MINUTES", 30),
            MAX_ACCESS_TOKEN_TTL_MINUTES,
            Duration::try_minutes,
        )?;
        let jwt_refresh_token_ttl_days = check_ttl(
            "JWT_REFRESH_TOKEN_TTL_DAYS",
            parse_or("JWT_REFRESH_TOKEN_TTL_DAYS", 7),
            MAX_REFRESH_TOKEN_TTL_DAYS,
            Duration::try_days,
        )?;

        let bcrypt_cost = parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                bcrypt_cost
            )));
        }

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            db_acquire_timeout_seconds,
            request_timeout_seconds,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            jwt_access_token_ttl_minutes,
            jwt_refresh_token_ttl_days,
            bcrypt_cost,
            superuser_usernames: parse_list(&env::var("SUPERUSER_USERNAMES").unwrap_or_default()),
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.jwt_access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.jwt_refresh_token_ttl_days)
    }

    /// Get database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> Option<String> {
        let url = self.database_url.as_ref()?;
        if let Some(at_pos) = url.find('@') {
            if let Some(colon_pos) = url[..at_pos].rfind(':') {
                let prefix = &url[..colon_pos + 1];
                let suffix = &url[at_pos..];
                return Some(format!("{}****{}", prefix, suffix));
            }
        }
        Some(url.clone())
    }
}

/// Reject lifetimes that are not positive, exceed `max`, or do not fit a
/// `Duration`.
fn check_ttl(
    key: &str,
    value: i64,
    max: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<i64, ConfigError> {
    if value <= 0 || value > max || to_duration(value).is_none() {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be between 1 and {}, got {}",
            key, max, value
        )));
    }
    Ok(value)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
