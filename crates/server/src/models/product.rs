//! Product domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gilded_core::{Money, ProductId};

/// A catalog product.
///
/// `stock` is the authoritative available-to-sell count. It is adjusted by
/// admin edits, checkout confirmation (clamped decrement), and cancellation
/// (restore). Non-negative at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Unit price.
    pub price: Money,
    /// Available-to-sell unit count.
    pub stock: i32,
    /// Catalog category.
    pub category: String,
    /// Opaque image reference, if any.
    pub image_url: Option<String>,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product (admin).
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Unit price.
    pub price: Money,
    /// Initial stock count.
    #[serde(default)]
    pub stock: i32,
    /// Catalog category.
    #[serde(default)]
    pub category: String,
    /// Opaque image reference, if any.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Partial update for a product (admin). `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New unit price. Does not affect already-placed orders (price
    /// snapshots live on the order lines).
    pub price: Option<Money>,
    /// New stock count.
    pub stock: Option<i32>,
    /// New category.
    pub category: Option<String>,
    /// New image reference.
    pub image_url: Option<String>,
}
