//! Data store access for the storefront.
//!
//! The backing store is a collaborator behind the [`Store`] trait: checkout,
//! lifecycle, and cancellation code talks to the trait, production wires in
//! [`PgStore`], and tests wire in [`MemoryStore`] with identical semantics.
//!
//! ## Tables
//!
//! - `products` - catalog with the authoritative stock count
//! - `orders` / `order_lines` - durable orders with price snapshots
//! - `profiles` - shopper contact + shipping address
//! - `cart_cache` - per-user persisted cart lines
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p gilded-cli -- migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use gilded_core::{OrderId, OrderStatus, ProductId, UserId};

use crate::cart::CartLine;
use crate::models::{
    NewOrder, NewOrderLine, NewProduct, OrderWithLines, Product, ProductUpdate, Profile,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Embedded migrations for the storefront database.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Errors from data store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness or integrity constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value failed to parse back into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// The backing data store.
///
/// Concurrency correctness lives at this layer, not in call ordering:
/// shoppers and admins run concurrent clients against the shared store, so
/// the stock operations are single atomic writes ("decrement with a
/// non-negative clamp") rather than read-then-write sequences, and order
/// creation is one transactional unit.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Products
    // =========================================================================

    /// List the catalog, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Fetch one product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Create a product (admin).
    async fn insert_product(&self, input: NewProduct) -> Result<Product, RepositoryError>;

    /// Partially update a product (admin). `None` when the product is gone.
    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Delete a product. Historical order lines keep referencing the ID
    /// weakly. Returns `false` when the product was already absent.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    /// Atomically decrement stock with a non-negative clamp:
    /// `stock = max(stock - quantity, 0)` in a single conditional write.
    ///
    /// Returns the new stock, or `None` when the product is gone.
    async fn take_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError>;

    /// Atomically increment stock by `quantity`.
    ///
    /// Returns the new stock, or `None` when the product is gone (the
    /// cancellation workflow skips those lines).
    async fn restore_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// Create an order header and all its lines in one transactional unit.
    ///
    /// The order starts `pending`. A failure writing any line leaves no
    /// payable order behind.
    async fn create_order(
        &self,
        order: NewOrder,
        lines: Vec<NewOrderLine>,
    ) -> Result<OrderWithLines, RepositoryError>;

    /// Fetch an order with its lines (line names resolved, weakly).
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithLines>, RepositoryError>;

    /// Fetch an order by its payment reference.
    async fn get_order_by_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<OrderWithLines>, RepositoryError>;

    /// List orders, newest first, optionally filtered to one owner.
    async fn list_orders(
        &self,
        owner: Option<UserId>,
    ) -> Result<Vec<OrderWithLines>, RepositoryError>;

    /// Persist a status change. Returns `false` when the order is gone.
    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError>;

    /// Delete an order's lines, then its header.
    ///
    /// Deleting an already-absent order is a no-op returning `false`, so a
    /// partially completed cancellation can be re-run safely.
    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError>;

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Fetch a shopper's profile.
    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError>;

    /// Create or replace a shopper's profile.
    async fn upsert_profile(&self, profile: Profile) -> Result<(), RepositoryError>;

    /// Save the shipping address onto an existing profile.
    /// Returns `false` when the profile is gone.
    async fn set_address(&self, user_id: UserId, address: &str) -> Result<bool, RepositoryError>;

    // =========================================================================
    // Cart cache
    // =========================================================================

    /// Load the persisted cart lines for one user (empty when none).
    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Persist the cart lines for one user, replacing any previous value.
    async fn save_cart(&self, user_id: UserId, lines: &[CartLine])
    -> Result<(), RepositoryError>;

    // =========================================================================
    // Health
    // =========================================================================

    /// Verify the store is reachable (readiness probe).
    async fn ping(&self) -> Result<(), RepositoryError>;
}
