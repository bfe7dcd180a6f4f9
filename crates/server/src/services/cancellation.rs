//! Cancellation workflow: refund, restock, notify, delete.
//!
//! A compensating transaction across three external systems with no
//! coordinator, ordered by blast radius: the refund comes first because it
//! is the only irreversible financial action. A refund failure aborts the
//! whole workflow with nothing changed. After a successful refund, every
//! remaining step is best-effort and idempotent, so a partially completed
//! cancellation can be re-invoked safely and the report tells the admin
//! exactly how far cleanup got.

use thiserror::Error;

use gilded_core::{Money, OrderId, OrderStatus};

use super::email::{self, Mailer};
use super::gateway::{GatewayError, PaymentGateway};
use super::notify::{ChangeEvent, ChangeFeed};
use crate::db::{RepositoryError, Store};
use crate::models::Profile;

/// Errors from the cancellation workflow.
#[derive(Debug, Error)]
pub enum CancellationError {
    /// The order exists but its owner's contact cannot be resolved.
    #[error("order owner contact could not be resolved")]
    ContactNotFound,

    /// The order is in a state that cannot be cancelled.
    #[error("a {0} order cannot be cancelled")]
    NotCancellable(OrderStatus),

    /// Data store failure before any irreversible step.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The gateway did not confirm the refund; nothing was changed.
    #[error("refund failed: {0}")]
    Refund(#[source] GatewayError),
}

/// What the workflow did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order was refunded and erased.
    Cancelled(CancellationReport),
    /// The order no longer resolves; re-invoking cancellation is a no-op.
    AlreadyCancelled,
}

/// Step-by-step record of a cancellation, for honest reporting.
///
/// The workflow is not globally transactional; an admin reading this can
/// see "refund processed, cleanup may be incomplete" rather than assuming
/// atomicity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CancellationReport {
    /// Amount refunded through the gateway.
    pub refunded: Money,
    /// Lines whose product stock was restored.
    pub lines_restored: usize,
    /// Lines skipped because the product no longer exists.
    pub lines_skipped: usize,
    /// Lines whose stock restore failed (logged, not fatal).
    pub restore_failures: usize,
    /// Whether the refund confirmation email went out.
    pub email_sent: bool,
    /// Whether the order record was deleted.
    pub deleted: bool,
}

/// The cancellation workflow.
pub struct CancellationService<'a> {
    store: &'a dyn Store,
    gateway: &'a dyn PaymentGateway,
    mailer: &'a dyn Mailer,
    feed: &'a ChangeFeed,
}

impl<'a> CancellationService<'a> {
    /// Create a cancellation service over the shared collaborators.
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

    /// Cancel an order: refund in full, restore stock, notify the customer,
    /// and erase the record.
    ///
    /// # Errors
    ///
    /// - [`CancellationError::Refund`] aborts with nothing changed - no
    ///   stock restore, no email, no deletion.
    /// - [`CancellationError::ContactNotFound`] aborts before the refund
    ///   (fail closed).
    ///
    /// An order id that no longer resolves yields
    /// [`CancelOutcome::AlreadyCancelled`], not an error.
    pub async fn cancel(&self, order_id: OrderId) -> Result<CancelOutcome, CancellationError> {
        let Some(order) = self.store.get_order(order_id).await? else {
            tracing::info!(order_id = %order_id, "Order already absent, cancellation is a no-op");
            return Ok(CancelOutcome::AlreadyCancelled);
        };

        if !order.order.status.can_cancel() {
            return Err(CancellationError::NotCancellable(order.order.status));
        }

        let profile = self
            .store
            .get_profile(order.order.user_id)
            .await?
            .ok_or(CancellationError::ContactNotFound)?;

        // The only irreversible step. Fail here and nothing has happened.
        let total = order.order.total_amount;
        self.gateway
            .refund(&order.order.payment_reference, total)
            .await
            .map_err(CancellationError::Refund)?;

        tracing::info!(
            order_id = %order_id,
            payment_reference = %order.order.payment_reference,
            amount = %total,
            "Refund processed"
        );

        // From here on: forward progress. The money is returned; stock,
        // email, and deletion are each attempted regardless of the others.
        let mut lines_restored = 0;
        let mut lines_skipped = 0;
        let mut restore_failures = 0;
        for line in &order.lines {
            match self.store.restore_stock(line.product_id, line.quantity).await {
                Ok(Some(stock)) => {
                    lines_restored += 1;
                    self.feed
                        .publish(ChangeEvent::product_stock(line.product_id.as_i32(), stock));
                }
                Ok(None) => {
                    lines_skipped += 1;
                    tracing::debug!(
                        product_id = %line.product_id,
                        "Product no longer exists, stock not restored"
                    );
                }
                Err(e) => {
                    restore_failures += 1;
                    tracing::error!(
                        product_id = %line.product_id,
                        error = %e,
                        "Failed to restore stock for cancelled order"
                    );
                }
            }
        }

        let email_sent = self.send_refund_email(&order, &profile, total).await;

        let deleted = match self.store.delete_order(order_id).await {
            Ok(deleted) => {
                if deleted {
                    self.feed.publish(ChangeEvent::order_deleted(
                        order_id.as_i32(),
                        order.order.user_id,
                    ));
                }
                deleted
            }
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    error = %e,
                    "Refund processed but order deletion failed; re-invoke cancellation to finish cleanup"
                );
                false
            }
        };

        tracing::info!(
            order_id = %order_id,
            lines_restored,
            lines_skipped,
            restore_failures,
            email_sent,
            deleted,
            "Cancellation finished"
        );

        Ok(CancelOutcome::Cancelled(CancellationReport {
            refunded: total,
            lines_restored,
            lines_skipped,
            restore_failures,
            email_sent,
            deleted,
        }))
    }

    /// Best-effort refund confirmation email.
    async fn send_refund_email(
        &self,
        order: &crate::models::OrderWithLines,
        profile: &Profile,
        refunded: Money,
    ) -> bool {
        let rendered = match email::refund_confirmation(order, refunded) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::error!(error = %e, "Failed to render refund email");
                return false;
            }
        };

        match self
            .mailer
            .send(&profile.email, &rendered.subject, &rendered.text, &rendered.html)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    order_id = %order.order.id,
                    error = %e,
                    "Failed to send refund email"
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gilded_core::{Email, Money, UserId};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewOrder, NewOrderLine, NewProduct, OrderWithLines, Product};
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

        fn cancellation(&self) -> CancellationService<'_> {
            CancellationService::new(&self.store, &self.gateway, &self.mailer, &self.feed)
        }

        async fn seed_shopper(&self, user: i32) {
            self.store
                .upsert_profile(Profile {
                    user_id: UserId::new(user),
                    email: Email::parse("shopper@example.com").unwrap(),
                    full_name: None,
                    address: None,
                })
                .await
                .unwrap();
        }

        async fn seed_product(&self, name: &str, price: i64, stock: i32) -> Product {
            self.store
                .insert_product(NewProduct {
                    name: name.to_string(),
                    description: String::new(),
                    price: Money::new(price),
                    stock,
                    category: "rings".to_string(),
                    image_url: None,
                })
                .await
                .unwrap()
        }

        /// A paid order for `quantity` units of each given product.
        async fn seed_paid_order(
            &self,
            user: i32,
            items: &[(&Product, i32)],
        ) -> OrderWithLines {
            let total: i64 = items
                .iter()
                .map(|(p, q)| p.price.amount() * i64::from(*q))
                .sum();
            let order = self
                .store
                .create_order(
                    NewOrder {
                        payment_reference: format!("ORDER-cancel-{user}"),
                        user_id: UserId::new(user),
                        total_amount: Money::new(total),
                        shipping_address: "Jl. Example No. 1".to_string(),
                    },
                    items
                        .iter()
                        .map(|(p, q)| NewOrderLine {
                            product_id: p.id,
                            quantity: *q,
                            price_at_purchase: p.price,
                        })
                        .collect(),
                )
                .await
                .unwrap();
            self.store
                .set_order_status(order.order.id, OrderStatus::Paid)
                .await
                .unwrap();
            for (p, q) in items {
                self.store.take_stock(p.id, *q).await.unwrap();
            }
            self.store.get_order(order.order.id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_cancel_round_trip_restores_stock_and_erases_order() {
        let fx = Fixture::new();
        fx.seed_shopper(1).await;
        let ring = fx.seed_product("Ring", 10_000, 5).await;
        let chain = fx.seed_product("Chain", 20_000, 4).await;
        let order = fx.seed_paid_order(1, &[(&ring, 3), (&chain, 1)]).await;

        let outcome = fx.cancellation().cancel(order.order.id).await.unwrap();
        let CancelOutcome::Cancelled(report) = outcome else {
            panic!("expected Cancelled outcome");
        };

        // Full refund of the snapshot total.
        assert_eq!(report.refunded, Money::new(50_000));
        let refunds = fx.gateway.refunds();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].payment_reference, order.order.payment_reference);
        assert_eq!(refunds[0].amount, Money::new(50_000));

        // Stock restored by exactly the quantities sold.
        assert_eq!(report.lines_restored, 2);
        assert_eq!(fx.store.get_product(ring.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(fx.store.get_product(chain.id).await.unwrap().unwrap().stock, 4);

        // Email out, order unresolvable by id.
        assert!(report.email_sent);
        assert!(report.deleted);
        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].subject,
            format!("Refund Processed - {}", order.order.payment_reference)
        );
        assert!(fx.store.get_order(order.order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refund_failure_aborts_with_nothing_changed() {
        let fx = Fixture::new();
        fx.seed_shopper(1).await;
        let ring = fx.seed_product("Ring", 10_000, 5).await;
        let order = fx.seed_paid_order(1, &[(&ring, 3)]).await;
        fx.gateway.fail_refund();

        let err = fx.cancellation().cancel(order.order.id).await.unwrap_err();
        assert!(matches!(err, CancellationError::Refund(_)));

        // Order and stock unchanged, no email.
        let reloaded = fx.store.get_order(order.order.id).await.unwrap().unwrap();
        assert_eq!(reloaded.order.status, OrderStatus::Paid);
        assert_eq!(fx.store.get_product(ring.id).await.unwrap().unwrap().stock, 2);
        assert!(fx.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_missing_order_is_noop() {
        let fx = Fixture::new();
        let outcome = fx.cancellation().cancel(OrderId::new(999)).await.unwrap();
        assert_eq!(outcome, CancelOutcome::AlreadyCancelled);
        assert!(fx.gateway.refunds().is_empty());
        assert!(fx.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_twice_second_is_noop() {
        let fx = Fixture::new();
        fx.seed_shopper(1).await;
        let ring = fx.seed_product("Ring", 10_000, 5).await;
        let order = fx.seed_paid_order(1, &[(&ring, 2)]).await;

        let first = fx.cancellation().cancel(order.order.id).await.unwrap();
        assert!(matches!(first, CancelOutcome::Cancelled(_)));

        let second = fx.cancellation().cancel(order.order.id).await.unwrap();
        assert_eq!(second, CancelOutcome::AlreadyCancelled);

        // Exactly one refund, one email, one restore.
        assert_eq!(fx.gateway.refunds().len(), 1);
        assert_eq!(fx.mailer.sent().len(), 1);
        assert_eq!(fx.store.get_product(ring.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_deleted_products_are_skipped_without_failing() {
        let fx = Fixture::new();
        fx.seed_shopper(1).await;
        let ring = fx.seed_product("Ring", 10_000, 5).await;
        let chain = fx.seed_product("Chain", 20_000, 4).await;
        let order = fx.seed_paid_order(1, &[(&ring, 1), (&chain, 1)]).await;

        fx.store.delete_product(chain.id).await.unwrap();

        let outcome = fx.cancellation().cancel(order.order.id).await.unwrap();
        let CancelOutcome::Cancelled(report) = outcome else {
            panic!("expected Cancelled outcome");
        };

        assert_eq!(report.lines_restored, 1);
        assert_eq!(report.lines_skipped, 1);
        assert!(report.deleted);
        assert_eq!(fx.store.get_product(ring.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_email_failure_is_not_fatal_after_refund() {
        let fx = Fixture::new();
        fx.seed_shopper(1).await;
        let ring = fx.seed_product("Ring", 10_000, 5).await;
        let order = fx.seed_paid_order(1, &[(&ring, 2)]).await;
        fx.mailer.fail_sends();

        let outcome = fx.cancellation().cancel(order.order.id).await.unwrap();
        let CancelOutcome::Cancelled(report) = outcome else {
            panic!("expected Cancelled outcome");
        };

        assert!(!report.email_sent);
        assert!(report.deleted);
        assert_eq!(fx.store.get_product(ring.id).await.unwrap().unwrap().stock, 5);
        assert!(fx.store.get_order(order.order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_contact_resolution_fails_closed_before_refund() {
        let fx = Fixture::new();
        // No profile seeded for user 1.
        let ring = fx.seed_product("Ring", 10_000, 5).await;
        let order = fx.seed_paid_order(1, &[(&ring, 2)]).await;

        let err = fx.cancellation().cancel(order.order.id).await.unwrap_err();
        assert!(matches!(err, CancellationError::ContactNotFound));
        assert!(fx.gateway.refunds().is_empty());
        assert!(fx.store.get_order(order.order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delivered_order_cannot_be_cancelled() {
        let fx = Fixture::new();
        fx.seed_shopper(1).await;
        let ring = fx.seed_product("Ring", 10_000, 5).await;
        let order = fx.seed_paid_order(1, &[(&ring, 1)]).await;
        fx.store
            .set_order_status(order.order.id, OrderStatus::Delivered)
            .await
            .unwrap();

        let err = fx.cancellation().cancel(order.order.id).await.unwrap_err();
        assert!(matches!(
            err,
            CancellationError::NotCancellable(OrderStatus::Delivered)
        ));
        assert!(fx.gateway.refunds().is_empty());
    }
}
