//! Person name type for account first/last names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PersonName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The input is empty or only whitespace.
    #[error("name cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside the allowed set.
    #[error("name may only contain letters, spaces, apostrophes or hyphens")]
    InvalidCharacter(char),
}

/// A first or last name.
///
/// ## Constraints
///
/// - At most 50 characters, not blank
/// - Letters (ASCII or Latin-1 accented `À`-`ÿ`), whitespace, `'` and `-`
///
/// ```
/// use novatech_core::PersonName;
///
/// assert!(PersonName::parse("Jean-Éric").is_ok());
/// assert!(PersonName::parse("O'Brien").is_ok());
/// assert!(PersonName::parse("R2D2").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PersonName(String);

impl PersonName {
    /// Maximum length of a name, in characters.
    pub const MAX_LENGTH: usize = 50;

    /// Parse a `PersonName` from a string.
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] describing the first violated constraint.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        if s.trim().is_empty() {
            return Err(NameError::Empty);
        }

        if let Some(c) = s.chars().find(|&c| !is_name_char(c)) {
            return Err(NameError::InvalidCharacter(c));
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(NameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(c, '\u{C0}'..='\u{FF}')
        || c.is_whitespace()
        || c == '\''
        || c == '-'
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
