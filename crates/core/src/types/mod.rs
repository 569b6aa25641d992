//! Core types for NovaTech.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod name;
pub mod password;
pub mod rating;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use name::{NameError, PersonName};
pub use password::{PasswordError, validate_password};
pub use rating::{Rating, RatingError};
pub use status::*;
