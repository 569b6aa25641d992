//! Password strength policy.
//!
//! Applied on registration and password reset. Never applied on login, so
//! accounts created under an older policy can still sign in.

use thiserror::Error;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters that satisfy the "special character" rule.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// The first rule a candidate password failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,
    #[error("password must contain a lowercase letter")]
    MissingLowercase,
    #[error("password must contain an uppercase letter")]
    MissingUppercase,
    #[error("password must contain a digit")]
    MissingDigit,
    #[error("password must contain a special character")]
    MissingSpecial,
}

/// Check a password against the store policy: at least eight characters with
/// a lowercase letter, an uppercase letter, a digit and one of
/// [`SPECIAL_CHARACTERS`].
///
/// # Errors
///
/// Returns the first [`PasswordError`] rule that is not satisfied.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::MissingDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(PasswordError::MissingSpecial);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_strong_password() {
        assert_eq!(validate_password("Secur3!pass"), Ok(()));
        assert_eq!(validate_password("Aa1{xxxx"), Ok(()));
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(validate_password("Aa1!"), Err(PasswordError::TooShort));
        assert_eq!(
            validate_password("PASSWORD1!"),
            Err(PasswordError::MissingLowercase)
        );
        assert_eq!(
            validate_password("password1!"),
            Err(PasswordError::MissingUppercase)
        );
        assert_eq!(
            validate_password("Password!!"),
            Err(PasswordError::MissingDigit)
        );
        assert_eq!(
            validate_password("Password12"),
            Err(PasswordError::MissingSpecial)
        );
    }

    #[test]
    fn test_underscore_is_not_special() {
        assert_eq!(
            validate_password("Password_12"),
            Err(PasswordError::MissingSpecial)
        );
    }
}
