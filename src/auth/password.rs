//! Password hashing and verification
//!
//! Thin wrapper over bcrypt. A wrong password is an ordinary `false`;
//! only a broken stored hash is an error.

use thiserror::Error;

/// Errors raised by the hashing primitive itself
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Password verifier fault: {0}")]
    VerifierFault(String),
}

/// Hash a secret with a fresh salt at the given bcrypt cost
pub fn hash_password(secret: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash(secret, cost).map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Check `candidate` against a stored bcrypt hash
///
/// # Returns
/// * `Ok(true)` if the secret matches
/// * `Ok(false)` on mismatch
/// * `Err(PasswordError::VerifierFault)` if the stored hash cannot be read
pub fn verify_password(stored_hash: &str, candidate: &str) -> Result<bool, PasswordError> {
    match bcrypt::verify(candidate, stored_hash) {
        Ok(true) => Ok(true),
        Ok(false) => {
            tracing::debug!("Password mismatch");
            Ok(false)
        }
        Err(e) => {
            tracing::error!(error = %e, "Stored password hash could not be verified");
            Err(PasswordError::VerifierFault(e.to_string()))
        }
    }
}
