//! Authentication error types.

use thiserror::Error;

use novatech_core::{EmailError, NameError, PasswordError};

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// First or last name rejected.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// Password does not meet the strength policy.
    #[error("password validation failed: {0}")]
    WeakPassword(#[from] PasswordError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password reset token unknown, used or expired.
    #[error("invalid or expired reset token")]
    InvalidResetToken,

    /// Session token missing.
    #[error("missing session token")]
    MissingToken,

    /// Session token malformed, forged or expired.
    #[error("invalid session token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    /// Session token could not be signed.
    #[error("token signing error: {0}")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
