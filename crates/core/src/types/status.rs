//! Order lifecycle status.

use serde::{Deserialize, Serialize};

/// The lifecycle state of an order.
///
/// The forward path is `pending → paid → shipped → delivered`, with a
/// cancellation branch `pending|paid → cancel_requested → cancelled`.
/// `pending → paid` is driven by payment confirmation; every other
/// transition is admin-initiated. Entering `cancelled` is reserved to the
/// cancellation workflow (refund, restock, delete) and is rejected by
/// [`OrderStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout initiation, before payment confirmation.
    #[default]
    Pending,
    /// Payment confirmed by the gateway.
    Paid,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer. Terminal.
    Delivered,
    /// Cancellation requested, refund not yet processed.
    CancelRequested,
    /// Refunded and erased. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Paid,
        Self::Shipped,
        Self::Delivered,
        Self::CancelRequested,
        Self::Cancelled,
    ];

    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether an order in this state may enter the cancellation workflow.
    ///
    /// Any state except terminal `delivered`; a `cancelled` order no longer
    /// exists, so the question never arises for it in practice.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        !self.is_terminal()
    }

    /// Whether a plain status update from `self` to `next` is legal.
    ///
    /// Covers the documented edges only. `cancelled` is never reachable
    /// through this check - the cancellation workflow owns that transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid)
                | (Self::Paid, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (Self::Pending | Self::Paid, Self::CancelRequested)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::CancelRequested => "cancel_requested",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancel_requested" => Ok(Self::CancelRequested),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}
