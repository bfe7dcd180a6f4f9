//! Shopper cart: candidate purchase lines before an order exists.
//!
//! The cart is pure state - no store, gateway, or mailer calls happen in
//! here. Persistence is a side effect of the route layer, which writes the
//! lines to the per-user cart cache on every mutation and hydrates from it
//! at session start via [`Cart::set_all`].
//!
//! Each line records the product's stock count at the time it entered the
//! cart; quantity adjustments are capped at that ceiling. The authoritative
//! check still happens at checkout confirmation, where stock is decremented
//! with a non-negative clamp.

use serde::{Deserialize, Serialize};

use gilded_core::{Money, ProductId};

use crate::models::Product;

/// One candidate purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Referenced product.
    pub product_id: ProductId,
    /// Product name at the time of add.
    pub name: String,
    /// Unit price snapshot at the time of add.
    pub unit_price: Money,
    /// Units in the cart.
    pub quantity: i32,
    /// Product stock at the time of add; quantity never exceeds this.
    pub stock_ceiling: i32,
}

impl CartLine {
    /// Snapshot price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price
            .checked_mul(i64::from(self.quantity))
            .unwrap_or(Money::ZERO)
    }
}

/// A shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Hydrate a cart from previously persisted lines.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// Add `quantity` units of a product, merging into an existing line.
    ///
    /// The combined quantity is capped at the product's stock; adding when
    /// already at the ceiling (or adding an out-of-stock product) is a
    /// silent no-op rather than an error.
    pub fn add(&mut self, product: &Product, quantity: i32) {
        if quantity <= 0 || product.stock <= 0 {
            return;
        }

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product.id)
        {
            line.quantity = (line.quantity + quantity).min(line.stock_ceiling);
            return;
        }

        self.lines.push(CartLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: quantity.min(product.stock),
            stock_ceiling: product.stock,
        });
    }

    /// Increase a line's quantity by one, capped at its stock ceiling.
    ///
    /// Unknown IDs are ignored.
    pub fn increase(&mut self, product_id: ProductId) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            if line.quantity < line.stock_ceiling {
                line.quantity += 1;
            }
        }
    }

    /// Decrease a line's quantity by one, removing the line below one.
    ///
    /// Unknown IDs are ignored.
    pub fn decrease(&mut self, product_id: ProductId) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            line.quantity -= 1;
        }
        self.lines.retain(|line| line.quantity > 0);
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Replace the whole cart atomically.
    pub fn set_all(&mut self, lines: Vec<CartLine>) {
        self.lines = lines;
    }

    /// The candidate purchase lines.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }
}
