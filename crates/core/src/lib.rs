//! NovaTech Core - Shared domain types.
//!
//! This crate provides the types used across all NovaTech components:
//! - `api` - JSON REST backend for the storefront
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, names, ratings and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
