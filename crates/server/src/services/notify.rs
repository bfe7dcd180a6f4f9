//! Change feed pushing order/product mutations to live viewers.
//!
//! Workflows publish an event after each successful commit - never before -
//! so subscribers only ever observe durable state. Subscribers apply events
//! as last-write-wins merges into their local view; a lagged receiver skips
//! straight to newer events, which under last-write-wins converges the same
//! way.
//!
//! Row filters mirror the two live views the storefront has: an admin
//! watching every order, and a shopper watching only their own.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use gilded_core::UserId;

use crate::models::{Order, Product};

/// Default buffered event capacity per feed.
const DEFAULT_CAPACITY: usize = 256;

/// Table a change event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedTable {
    Orders,
    Products,
}

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedAction {
    Insert,
    Update,
    Delete,
}

/// One row-level mutation event.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// Mutated table.
    pub table: FeedTable,
    /// Kind of mutation.
    pub action: FeedAction,
    /// Row identifier.
    pub id: i32,
    /// Owning user, for owner-filtered subscriptions (orders only).
    pub owner: Option<UserId>,
    /// The row after the mutation (empty object for deletes).
    pub payload: serde_json::Value,
}

impl ChangeEvent {
    /// Event for an order insert or update.
    #[must_use]
    pub fn order(action: FeedAction, order: &Order) -> Self {
        Self {
            table: FeedTable::Orders,
            action,
            id: order.id.as_i32(),
            owner: Some(order.user_id),
            payload: serde_json::to_value(order).unwrap_or_default(),
        }
    }

    /// Event for an order deletion (the row no longer exists).
    #[must_use]
    pub fn order_deleted(id: i32, owner: UserId) -> Self {
        Self {
            table: FeedTable::Orders,
            action: FeedAction::Delete,
            id,
            owner: Some(owner),
            payload: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Event for a product insert or update.
    #[must_use]
    pub fn product(action: FeedAction, product: &Product) -> Self {
        Self {
            table: FeedTable::Products,
            action,
            id: product.id.as_i32(),
            owner: None,
            payload: serde_json::to_value(product).unwrap_or_default(),
        }
    }

    /// Event for a product stock adjustment (checkout take / cancel restore).
    #[must_use]
    pub fn product_stock(id: i32, stock: i32) -> Self {
        Self {
            table: FeedTable::Products,
            action: FeedAction::Update,
            id,
            owner: None,
            payload: serde_json::json!({ "id": id, "stock": stock }),
        }
    }

    /// Event for a product deletion.
    #[must_use]
    pub fn product_deleted(id: i32) -> Self {
        Self {
            table: FeedTable::Products,
            action: FeedAction::Delete,
            id,
            owner: None,
            payload: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Row filter for a subscription.
///
/// `table: None` subscribes to everything; `owner: Some(u)` restricts to
/// rows owned by `u` (i.e. "orders where owner = u").
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FeedFilter {
    /// Restrict to one table.
    pub table: Option<FeedTable>,
    /// Restrict to rows owned by this user.
    pub owner: Option<UserId>,
}

impl FeedFilter {
    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(table) = self.table
            && table != event.table
        {
            return false;
        }
        if let Some(owner) = self.owner
            && event.owner != Some(owner)
        {
            return false;
        }
        true
    }
}

/// Broadcast channel distributing [`ChangeEvent`]s to live subscribers.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    /// Create a feed with the given buffered capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped; publishing is always
    /// best-effort and never blocks the workflow that committed the change.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.tx.receiver_count();
        if self.tx.send(event).is_err() {
            tracing::trace!(receivers, "change event dropped (no subscribers)");
        }
    }

    /// Subscribe with a row filter.
    #[must_use]
    pub fn subscribe(&self, filter: FeedFilter) -> FeedSubscription {
        FeedSubscription {
            rx: self.tx.subscribe(),
            filter,
        }
    }
}

/// A filtered subscription to the change feed.
pub struct FeedSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: FeedFilter,
}

impl FeedSubscription {
    /// Receive the next matching event, or `None` once the feed is closed.
    ///
    /// A lagged receiver drops the missed events and continues with the
    /// newest available ones.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "change feed subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
