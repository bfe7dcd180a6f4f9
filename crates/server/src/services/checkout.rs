//! Checkout orchestrator: cart to payable order to confirmed payment.
//!
//! `begin` turns the shopper's cached cart into a pending order and opens a
//! payment session; the gateway's interactive UI runs out-of-process and
//! reports back through `confirm`. The two halves share no state beyond the
//! order's payment reference.
//!
//! Failure policy: validation rejects before any side effect; a failed
//! payment-session request leaves the pending order behind (visible to
//! admins as a stale pending order, never retried automatically); after a
//! confirmed payment every remaining step is best-effort and logged, because
//! the captured payment is the fact that matters.

use thiserror::Error;
use uuid::Uuid;

use gilded_core::{OrderStatus, UserId};

use super::email::{self, Mailer};
use super::gateway::{
    GatewayError, PaymentGateway, PaymentOutcome, PaymentSession, SessionItem, SessionRequest,
};
use super::notify::{ChangeEvent, ChangeFeed, FeedAction};
use crate::cart::Cart;
use crate::db::{RepositoryError, Store};
use crate::models::{NewOrder, NewOrderLine, OrderWithLines};

/// Errors from the checkout workflow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The shopper's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// No usable shipping address was provided.
    #[error("shipping address is required")]
    MissingAddress,

    /// The shopper has no profile to resolve contact details from.
    #[error("customer profile not found")]
    ProfileNotFound,

    /// No order matches the given payment reference.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Data store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The gateway refused or failed to open a payment session.
    #[error("payment session failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// A started checkout: the pending order plus the gateway session driving
/// the payment UI.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    /// The pending order with its lines.
    pub order: OrderWithLines,
    /// The opened payment session.
    pub session: PaymentSession,
}

/// Result of reporting a payment outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmResult {
    /// The order's status after handling the outcome.
    pub status: OrderStatus,
    /// Advisory message for the shopper.
    pub message: &'static str,
}

/// The checkout workflow.
pub struct CheckoutService<'a> {
    store: &'a dyn Store,
    gateway: &'a dyn PaymentGateway,
    mailer: &'a dyn Mailer,
    feed: &'a ChangeFeed,
}

impl<'a> CheckoutService<'a> {
    /// Create a checkout service over the shared collaborators.
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        gateway: &'a dyn PaymentGateway,
        mailer: &'a dyn Mailer,
        feed: &'a ChangeFeed,
    ) -> Self {
        Self {
            store,
            gateway,
            mailer,
            feed,
        }
    }

    /// Turn the shopper's cached cart into a pending order and open a
    /// payment session.
    ///
    /// # Errors
    ///
    /// Validation errors (`MissingAddress`, `ProfileNotFound`, `EmptyCart`)
    /// are returned before any side effect. A gateway failure is returned
    /// after the pending order has been created; the order stays collectible
    /// in admin views.
    pub async fn begin(
        &self,
        user_id: UserId,
        shipping_address: &str,
    ) -> Result<CheckoutStarted, CheckoutError> {
        let address = shipping_address.trim();
        if address.is_empty() {
            return Err(CheckoutError::MissingAddress);
        }

        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or(CheckoutError::ProfileNotFound)?;

        let cart = Cart::from_lines(self.store.load_cart(user_id).await?);
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Random component makes references collision-free under concurrent
        // checkouts.
        let payment_reference = format!("ORDER-{}", Uuid::new_v4());

        // Saving the address onto the profile is a convenience for the next
        // checkout, not part of the order's atomicity.
        if let Err(e) = self.store.set_address(user_id, address).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to save shipping address");
        }

        let total = cart.total();
        let lines: Vec<NewOrderLine> = cart
            .lines()
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.unit_price,
            })
            .collect();

        let order = self
            .store
            .create_order(
                NewOrder {
                    payment_reference: payment_reference.clone(),
                    user_id,
                    total_amount: total,
                    shipping_address: address.to_owned(),
                },
                lines,
            )
            .await?;

        self.feed
            .publish(ChangeEvent::order(FeedAction::Insert, &order.order));

        let items: Vec<SessionItem> = cart
            .lines()
            .iter()
            .map(|line| SessionItem {
                id: line.product_id.to_string(),
                price: line.unit_price.amount(),
                quantity: line.quantity,
                name: line.name.clone(),
            })
            .collect();

        let session = self
            .gateway
            .create_session(&SessionRequest {
                payment_reference: payment_reference.clone(),
                gross_amount: total,
                items,
                customer_name: profile.display_name().to_owned(),
                customer_email: profile.email.clone(),
            })
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    payment_reference = %payment_reference,
                    error = %e,
                    "Payment session failed; order left pending"
                );
            })?;

        tracing::info!(
            order_id = %order.order.id,
            payment_reference = %payment_reference,
            total = %total,
            "Checkout started"
        );

        Ok(CheckoutStarted { order, session })
    }

    /// Handle the outcome reported by the out-of-process payment UI.
    ///
    /// Anything other than `Success` changes nothing: the order stays
    /// `pending` and the shopper gets an advisory message.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` when the payment reference does not resolve;
    /// repository errors from the paid-status write.
    pub async fn confirm(
        &self,
        payment_reference: &str,
        outcome: PaymentOutcome,
    ) -> Result<ConfirmResult, CheckoutError> {
        let order = self
            .store
            .get_order_by_reference(payment_reference)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(payment_reference.to_owned()))?;

        match outcome {
            PaymentOutcome::Success => self.complete(order).await,
            PaymentOutcome::Pending => Ok(ConfirmResult {
                status: order.order.status,
                message: "Waiting for payment...",
            }),
            PaymentOutcome::Error => Ok(ConfirmResult {
                status: order.order.status,
                message: "Payment failed",
            }),
            PaymentOutcome::Close => Ok(ConfirmResult {
                status: order.order.status,
                message: "Payment window closed before completion",
            }),
        }
    }

    /// Commit the effects of a confirmed payment.
    async fn complete(&self, order: OrderWithLines) -> Result<ConfirmResult, CheckoutError> {
        // Callback replays must not decrement stock twice or regress an
        // order the lifecycle has already moved past `paid`.
        if order.order.status != OrderStatus::Pending {
            return Ok(ConfirmResult {
                status: order.order.status,
                message: "Payment already confirmed",
            });
        }

        let updated = self
            .store
            .set_order_status(order.order.id, OrderStatus::Paid)
            .await?;
        if !updated {
            return Err(CheckoutError::OrderNotFound(
                order.order.payment_reference.clone(),
            ));
        }

        // Per-line clamped decrement; products sold out or deleted in the
        // meantime are floored at zero / skipped.
        for line in &order.lines {
            match self.store.take_stock(line.product_id, line.quantity).await {
                Ok(Some(stock)) => {
                    self.feed
                        .publish(ChangeEvent::product_stock(line.product_id.as_i32(), stock));
                }
                Ok(None) => {
                    tracing::debug!(
                        product_id = %line.product_id,
                        "Product no longer exists, stock not decremented"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        product_id = %line.product_id,
                        error = %e,
                        "Failed to decrement stock for paid order"
                    );
                }
            }
        }

        if let Err(e) = self.store.save_cart(order.order.user_id, &[]).await {
            tracing::error!(user_id = %order.order.user_id, error = %e, "Failed to clear cart cache");
        }

        let mut paid = order;
        paid.order.status = OrderStatus::Paid;
        self.feed
            .publish(ChangeEvent::order(FeedAction::Update, &paid.order));

        self.send_confirmation_email(&paid).await;

        tracing::info!(
            order_id = %paid.order.id,
            payment_reference = %paid.order.payment_reference,
            "Payment confirmed"
        );

        Ok(ConfirmResult {
            status: OrderStatus::Paid,
            message: "Payment confirmed",
        })
    }

    /// Best-effort order confirmation email.
    async fn send_confirmation_email(&self, order: &OrderWithLines) {
        let profile = match self.store.get_profile(order.order.user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::warn!(
                    user_id = %order.order.user_id,
                    "No profile for confirmation email"
                );
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve profile for confirmation email");
                return;
            }
        };

        let rendered = match email::order_confirmation(order) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::error!(error = %e, "Failed to render confirmation email");
                return;
            }
        };

        if let Err(e) = self
            .mailer
            .send(&profile.email, &rendered.subject, &rendered.text, &rendered.html)
            .await
        {
            tracing::error!(
                order_id = %order.order.id,
                error = %e,
                "Failed to send confirmation email"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gilded_core::{Email, Money};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewProduct, Product, Profile};
    use crate::services::notify::{FeedFilter, FeedTable};
    use crate::testing::{RecordingMailer, ScriptedGateway};

    struct Fixture {
        store: MemoryStore,
        gateway: ScriptedGateway,
        mailer: RecordingMailer,
        feed: ChangeFeed,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                gateway: ScriptedGateway::new(),
                mailer: RecordingMailer::new(),
                feed: ChangeFeed::default(),
            }
        }

        fn checkout(&self) -> CheckoutService<'_> {
            CheckoutService::new(&self.store, &self.gateway, &self.mailer, &self.feed)
        }

        async fn seed_shopper(&self, user: i32) -> UserId {
            let user_id = UserId::new(user);
            self.store
                .upsert_profile(Profile {
                    user_id,
                    email: Email::parse("shopper@example.com").unwrap(),
                    full_name: Some("Shopper".to_string()),
                    address: None,
                })
                .await
                .unwrap();
            user_id
        }

        async fn seed_product(&self, price: i64, stock: i32) -> Product {
            self.store
                .insert_product(NewProduct {
                    name: "Gold Ring".to_string(),
                    description: String::new(),
                    price: Money::new(price),
                    stock,
                    category: "rings".to_string(),
                    image_url: None,
                })
                .await
                .unwrap()
        }

        async fn fill_cart(&self, user_id: UserId, product: &Product, quantity: i32) {
            let mut cart = Cart::new();
            cart.add(product, quantity);
            self.store.save_cart(user_id, cart.lines()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_begin_creates_pending_order_with_snapshot_total() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 3).await;

        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();

        assert_eq!(started.order.order.status, OrderStatus::Pending);
        assert_eq!(started.order.order.total_amount, Money::new(30_000));
        assert_eq!(started.order.lines.len(), 1);
        assert!(started.order.order.payment_reference.starts_with("ORDER-"));
        assert_eq!(
            started.session.token,
            format!("token-{}", started.order.order.payment_reference)
        );

        // Stock is untouched until the payment is confirmed.
        let reloaded = fx.store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stock, 5);

        // The address was saved onto the profile (best-effort).
        let profile = fx.store.get_profile(user).await.unwrap().unwrap();
        assert_eq!(profile.address.as_deref(), Some("Jl. Example No. 1"));
    }

    #[tokio::test]
    async fn test_begin_rejects_blank_address_before_side_effects() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 1).await;

        let err = fx.checkout().begin(user, "   ").await.unwrap_err();
        assert!(matches!(err, CheckoutError::MissingAddress));
        assert!(fx.store.list_orders(None).await.unwrap().is_empty());
        assert!(fx.gateway.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_begin_rejects_empty_cart() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;

        let err = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_begin_rejects_unknown_shopper() {
        let fx = Fixture::new();
        let err = fx
            .checkout()
            .begin(UserId::new(42), "Jl. Example No. 1")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ProfileNotFound));
    }

    #[tokio::test]
    async fn test_begin_gateway_failure_leaves_stale_pending_order() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 1).await;
        fx.gateway.fail_create_session();

        let err = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(_)));

        // The pending order remains collectible.
        let orders = fx.store.list_orders(None).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_unique_references_across_checkouts() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;

        fx.fill_cart(user, &product, 1).await;
        let first = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();
        fx.fill_cart(user, &product, 1).await;
        let second = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();

        assert_ne!(
            first.order.order.payment_reference,
            second.order.order.payment_reference
        );
    }

    #[tokio::test]
    async fn test_confirm_success_marks_paid_and_decrements_stock() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 3).await;

        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();
        let reference = started.order.order.payment_reference.clone();

        let result = fx
            .checkout()
            .confirm(&reference, PaymentOutcome::Success)
            .await
            .unwrap();
        assert_eq!(result.status, OrderStatus::Paid);

        // Stock 5, sold 3, leaves 2.
        let reloaded = fx.store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stock, 2);

        // Cart cleared, confirmation email sent.
        assert!(fx.store.load_cart(user).await.unwrap().is_empty());
        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, format!("Order Confirmation - {reference}"));
    }

    #[tokio::test]
    async fn test_confirm_success_is_idempotent() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 3).await;

        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();
        let reference = started.order.order.payment_reference.clone();

        fx.checkout().confirm(&reference, PaymentOutcome::Success).await.unwrap();
        let replay = fx
            .checkout()
            .confirm(&reference, PaymentOutcome::Success)
            .await
            .unwrap();
        assert_eq!(replay.status, OrderStatus::Paid);

        // No double decrement, no second email.
        let reloaded = fx.store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stock, 2);
        assert_eq!(fx.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_replay_does_not_regress_later_statuses() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 1).await;

        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();
        let reference = started.order.order.payment_reference.clone();
        fx.checkout().confirm(&reference, PaymentOutcome::Success).await.unwrap();

        // The admin ships the order; a stray success replay arrives after.
        fx.store
            .set_order_status(started.order.order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        let replay = fx
            .checkout()
            .confirm(&reference, PaymentOutcome::Success)
            .await
            .unwrap();

        assert_eq!(replay.status, OrderStatus::Shipped);
        let order = fx.store.get_order(started.order.order.id).await.unwrap().unwrap();
        assert_eq!(order.order.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_confirm_non_success_changes_nothing() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 3).await;

        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();
        let reference = started.order.order.payment_reference.clone();

        for outcome in [
            PaymentOutcome::Pending,
            PaymentOutcome::Error,
            PaymentOutcome::Close,
        ] {
            let result = fx.checkout().confirm(&reference, outcome).await.unwrap();
            assert_eq!(result.status, OrderStatus::Pending);
        }

        let reloaded = fx.store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stock, 5);
        assert!(!fx.store.load_cart(user).await.unwrap().is_empty());
        assert!(fx.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_unknown_reference() {
        let fx = Fixture::new();
        let err = fx
            .checkout()
            .confirm("ORDER-missing", PaymentOutcome::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_confirm_clamps_stock_when_oversold() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 3).await;
        fx.fill_cart(user, &product, 3).await;
        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();

        // A concurrent sale drained the stock below this order's margin.
        fx.store.take_stock(product.id, 2).await.unwrap();

        fx.checkout()
            .confirm(&started.order.order.payment_reference, PaymentOutcome::Success)
            .await
            .unwrap();

        let reloaded = fx.store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stock, 0);
    }

    #[tokio::test]
    async fn test_confirm_email_failure_does_not_undo_payment() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 1).await;
        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();
        fx.mailer.fail_sends();

        let result = fx
            .checkout()
            .confirm(&started.order.order.payment_reference, PaymentOutcome::Success)
            .await
            .unwrap();
        assert_eq!(result.status, OrderStatus::Paid);

        let order = fx.store.get_order(started.order.order.id).await.unwrap().unwrap();
        assert_eq!(order.order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_events_published_after_commit() {
        let fx = Fixture::new();
        let user = fx.seed_shopper(1).await;
        let product = fx.seed_product(10_000, 5).await;
        fx.fill_cart(user, &product, 2).await;

        let mut orders_sub = fx.feed.subscribe(FeedFilter {
            table: Some(FeedTable::Orders),
            owner: Some(user),
        });

        let started = fx.checkout().begin(user, "Jl. Example No. 1").await.unwrap();
        let inserted = orders_sub.recv().await.unwrap();
        assert_eq!(inserted.id, started.order.order.id.as_i32());
        assert_eq!(inserted.payload["status"], "pending");

        fx.checkout()
            .confirm(&started.order.order.payment_reference, PaymentOutcome::Success)
            .await
            .unwrap();
        let updated = orders_sub.recv().await.unwrap();
        assert_eq!(updated.payload["status"], "paid");
    }
}
