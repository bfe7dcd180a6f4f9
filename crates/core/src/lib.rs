//! Gilded Core - Shared types library.
//!
//! This crate provides common types used across all Gilded components:
//! - `server` - The storefront service (catalog, checkout, order lifecycle)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money amounts, emails,
//!   and the order lifecycle status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
