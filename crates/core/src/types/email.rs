//! Account email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a string is not an acceptable account email.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email is required")]
    Empty,
    #[error("email must not exceed {max} characters")]
    TooLong { max: usize },
    #[error("email must look like name@domain.tld")]
    Malformed,
}

/// An account email, which is also the login identifier.
///
/// Only the shape is checked: one `@`, a non-empty local part, and a dotted
/// domain with no empty labels. Whether the mailbox exists is only ever
/// learned through the password reset email.
///
/// ```
/// use novatech_core::Email;
///
/// assert!(Email::parse("ada@novatech.com").is_ok());
/// assert!(Email::parse("ada.lovelace+shop@mail.novatech.co.uk").is_ok());
///
/// assert!(Email::parse("ada@localhost").is_err());
/// assert!(Email::parse("ada@@novatech.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Column width of `users.email`.
    pub const MAX_LENGTH: usize = 255;

    /// Validate an email address.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] if the address is empty, too long or malformed.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let well_formed = !s.chars().any(char::is_whitespace)
            && s.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && domain.split('.').all(|label| !label.is_empty())
            });

        if well_formed {
            Ok(Self(s.to_owned()))
        } else {
            Err(EmailError::Malformed)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

// Rows written before validation existed are trusted as-is.
#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<String as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_addresses() {
        for ok in [
            "ada@novatech.com",
            "ada.lovelace@novatech.com",
            "ada+orders@novatech.com",
            "a@b.co",
        ] {
            assert!(Email::parse(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for bad in [
            "novatech.com",
            "@novatech.com",
            "ada@",
            "ada@novatech",
            "ada@novatech.",
            "ada@.com",
            "ada@nova@tech.com",
            "ada lovelace@novatech.com",
        ] {
            assert_eq!(Email::parse(bad), Err(EmailError::Malformed), "{bad}");
        }
    }

    #[test]
    fn test_length_limit() {
        let domain = "@novatech.com";
        let at_limit = format!("{}{domain}", "a".repeat(Email::MAX_LENGTH - domain.len()));
        assert!(Email::parse(&at_limit).is_ok());

        let over = format!("a{at_limit}");
        assert_eq!(
            Email::parse(&over),
            Err(EmailError::TooLong { max: 255 })
        );
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
    }

    #[test]
    fn test_serde_validates() {
        let email: Email = serde_json::from_str("\"ada@novatech.com\"").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"ada@novatech.com\"");
        assert!(serde_json::from_str::<Email>("\"not-an-email\"").is_err());
    }
}
