//! Signed session tokens (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use novatech_core::UserId;

use super::AuthError;

/// Token lifetime when the user ticks "remember me".
pub const REMEMBER_ME_TTL: Duration = Duration::days(30);

/// Token lifetime otherwise.
pub const SESSION_TTL: Duration = Duration::days(1);

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User the token was issued to.
    pub sub: UserId,
    /// Issued at (Unix timestamp seconds)
    pub iat: i64,
    /// Expiration (Unix timestamp seconds)
    pub exp: i64,
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    /// Build keys from the configured signing secret.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Issue a token for `user_id` valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenSigning` if the token cannot be encoded.
    pub fn issue(&self, user_id: UserId, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::TokenSigning)
    }

    /// Verify a token's signature and expiry and return its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed, signed
    /// with another key or expired.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(AuthError::InvalidToken)
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys(secret: &str) -> TokenKeys {
        TokenKeys::new(&SecretString::from(secret))
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys("k3Y!9xQ@vB7#mZ2$wL5%rT8^pN4&cH6*");
        let user_id = UserId::generate();

        let token = keys.issue(user_id, SESSION_TTL).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), user_id);
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let token = keys("k3Y!9xQ@vB7#mZ2$wL5%rT8^pN4&cH6*")
            .issue(UserId::generate(), SESSION_TTL)
            .unwrap();

        let result = keys("Zq8#Lp2!Wm5@Xn7$Rv4%Tb9^Yc3&Hd6*").verify(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_rejects_expired_token() {
        let keys = keys("k3Y!9xQ@vB7#mZ2$wL5%rT8^pN4&cH6*");
        let token = keys
            .issue(UserId::generate(), Duration::hours(-2))
            .unwrap();

        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        let keys = keys("k3Y!9xQ@vB7#mZ2$wL5%rT8^pN4&cH6*");
        assert!(matches!(
            keys.verify("not.a.jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
