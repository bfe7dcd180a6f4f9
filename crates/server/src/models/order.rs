//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gilded_core::{Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

/// A placed order.
///
/// `total_amount` equals the sum of the line snapshots at creation time and
/// is never recomputed - later catalog price changes do not touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Human-facing reference shared with the payment gateway.
    pub payment_reference: String,
    /// Owning shopper.
    pub user_id: UserId,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Total at creation time.
    pub total_amount: Money,
    /// Shipping address snapshot.
    pub shipping_address: String,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// A line of a placed order.
///
/// `product_id` is a weak reference: the product may be edited or deleted
/// later without invalidating the line. `price_at_purchase` is the immutable
/// snapshot taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    /// Unique line ID.
    pub id: OrderLineId,
    /// Owning order.
    pub order_id: OrderId,
    /// Referenced product (may no longer resolve).
    pub product_id: ProductId,
    /// Units purchased.
    pub quantity: i32,
    /// Unit price snapshot taken at checkout.
    pub price_at_purchase: Money,
    /// Product name resolved at read time, if the product still exists.
    pub product_name: Option<String>,
}

impl OrderLine {
    /// Name to show for this line, falling back when the product is gone.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or("Item")
    }

    /// Snapshot price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price_at_purchase
            .checked_mul(i64::from(self.quantity))
            .unwrap_or(Money::ZERO)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithLines {
    /// The order header.
    #[serde(flatten)]
    pub order: Order,
    /// The order's lines.
    pub lines: Vec<OrderLine>,
}

impl OrderWithLines {
    /// Sum of the line snapshots.
    ///
    /// Equals `order.total_amount` for any order this system created; kept
    /// separate so the invariant is checkable.
    #[must_use]
    pub fn computed_total(&self) -> Money {
        self.lines.iter().map(OrderLine::line_total).sum()
    }
}

/// Input for creating an order header. Orders are always created `pending`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Human-facing reference shared with the payment gateway.
    pub payment_reference: String,
    /// Owning shopper.
    pub user_id: UserId,
    /// Total at creation time.
    pub total_amount: Money,
    /// Shipping address snapshot.
    pub shipping_address: String,
}

/// Input for creating one order line.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    /// Referenced product.
    pub product_id: ProductId,
    /// Units purchased.
    pub quantity: i32,
    /// Unit price snapshot.
    pub price_at_purchase: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, price: i64) -> OrderLine {
        OrderLine {
            id: OrderLineId::new(1),
            order_id: OrderId::new(1),
            product_id: ProductId::new(1),
            quantity,
            price_at_purchase: Money::new(price),
            product_name: None,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(3, 10_000).line_total(), Money::new(30_000));
    }

    #[test]
    fn test_display_name_fallback() {
        let mut l = line(1, 100);
        assert_eq!(l.display_name(), "Item");
        l.product_name = Some("Gold Ring".to_string());
        assert_eq!(l.display_name(), "Gold Ring");
    }
}
