//! Gilded storefront service library.
//!
//! The service owns the order lifecycle: a shopper's cart becomes a payable
//! order, the payment gateway confirms it, admins move it through fulfillment,
//! and cancellation reverses a paid order with a refund, a stock restore, and
//! a customer notification.
//!
//! # Architecture
//!
//! - Axum JSON API (see [`routes`] for the route table)
//! - A [`db::Store`] seam over the backing data store, with `PostgreSQL`
//!   (sqlx) and in-memory implementations
//! - Collaborator seams for the payment gateway and the email sender, so
//!   workflows are exercised end-to-end in tests with scripted doubles
//! - A broadcast change feed ([`services::notify`]) pushing order/product
//!   mutations to live viewers over SSE

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod testing;
