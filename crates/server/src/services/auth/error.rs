//! Authentication error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] shopfront_core::EmailError),

    /// Name missing or out of bounds.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Invalid credentials (wrong password, unknown email, or wrong role).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("email already in use")]
    EmailTaken,

    /// First-admin registration attempted after an admin exists.
    #[error("an admin account already exists")]
    AdminsExist,

    /// The acting principal is not allowed to do this.
    #[error("forbidden")]
    Forbidden,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
