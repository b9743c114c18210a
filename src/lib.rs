//! AuthVault Library
//!
//! Password authentication with short-lived access tokens and rotating,
//! reuse-detecting refresh tokens.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
