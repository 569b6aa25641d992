//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password accounts, session tokens, password reset
//! - `email` - Transactional email (password reset, password changed)
//! - `payment` - Stripe PaymentIntents client

pub mod auth;
pub mod email;
pub mod payment;
