//! Authentication service.
//!
//! Password accounts with argon2 hashes, signed session tokens and the
//! emailed password-reset flow.

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, REMEMBER_ME_TTL, SESSION_TTL, TokenKeys};

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use novatech_core::{Email, PersonName, UserId, validate_password};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;

/// How long an emailed reset link stays valid.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// Raw reset tokens are this many random bytes, hex encoded.
const RESET_TOKEN_BYTES: usize = 32;

/// Verified against when a login names an unknown email, so that path costs
/// the same argon2 work as a wrong password.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("unused-dummy-password").ok());

/// Account details submitted at registration.
#[derive(Debug)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword`, `AuthError::InvalidName` or
    /// `AuthError::InvalidEmail` if validation fails.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, form: &Registration<'_>) -> Result<User, AuthError> {
        validate_password(form.password)?;
        let first_name = PersonName::parse(form.first_name)?;
        let last_name = PersonName::parse(form.last_name)?;
        let email = Email::parse(form.email)?;

        let password_hash = hash_password(form.password)?;

        self.users
            .create(&NewUser {
                email: &email,
                password_hash: &password_hash,
                first_name: &first_name,
                last_name: &last_name,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Check an email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((user, password_hash)) = self.users.get_credentials(&email).await? else {
            if let Some(dummy) = DUMMY_PASSWORD_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Look up the user a session belongs to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn current_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Change a user's name and email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if another account uses the email.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, AuthError> {
        let first_name = PersonName::parse(first_name)?;
        let last_name = PersonName::parse(last_name)?;
        let email = Email::parse(email)?;

        self.users
            .update_profile(user_id, &email, &first_name, &last_name)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Delete an account and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn delete_account(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.delete(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })
    }

    /// Create a password reset token for the account with this email.
    ///
    /// Returns the user and the raw token to put in the emailed link. Only
    /// the token's SHA-256 is stored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account uses the email.
    pub async fn start_password_reset(&self, email: &str) -> Result<(User, String), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::UserNotFound)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_reset_token();
        self.users
            .set_reset_token(user.id, &hash_reset_token(&token), Utc::now() + RESET_TOKEN_TTL)
            .await?;

        Ok((user, token))
    }

    /// Set a new password using an emailed reset token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` if the token is unknown or
    /// expired, and `AuthError::WeakPassword` if the new password fails the
    /// policy.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<User, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .reset_password(&hash_reset_token(token), &password_hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }
}

/// Generate a random password reset token (64 hex characters).
#[must_use]
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of a reset token, hex encoded, as stored in the database.
#[must_use]
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_hash_is_real_argon2_that_rejects_everything() {
        let dummy = DUMMY_PASSWORD_HASH.as_deref().unwrap();
        assert!(dummy.starts_with("$argon2id$"));
        assert!(matches!(
            verify_password("Secur3!pass", dummy),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("Secur3!pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secur3!pass", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("whatever", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_reset_token_shape() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_reset_token());
    }

    #[test]
    fn test_reset_token_hash_is_stable() {
        let token = "abc";
        assert_eq!(
            hash_reset_token(token),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_reset_token(token).len(), 64);
    }
}
