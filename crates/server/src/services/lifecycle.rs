//! Order lifecycle controller: the status state machine.
//!
//! Transitions persist first, then notify: the status change is the durable
//! fact, the customer email is best-effort. A transition into `cancelled` is
//! not a field update at all - it is delegated entirely to the cancellation
//! workflow.

use thiserror::Error;

use gilded_core::{OrderId, OrderStatus};

use super::cancellation::{CancelOutcome, CancellationError, CancellationService};
use super::email::{self, EmailError, Mailer};
use super::gateway::PaymentGateway;
use super::notify::{ChangeEvent, ChangeFeed, FeedAction};
use crate::db::{RepositoryError, Store};
use crate::models::OrderWithLines;

/// Errors from lifecycle transitions and status notifications.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// No order with the given ID.
    #[error("order not found")]
    NotFound,

    /// The requested edge is not part of the lifecycle.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The order owner's contact cannot be resolved.
    #[error("order owner contact could not be resolved")]
    ContactNotFound,

    /// Data store failure; the caller must treat the update as not applied.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The delegated cancellation workflow failed.
    #[error(transparent)]
    Cancellation(#[from] CancellationError),

    /// Email dispatch failed (only surfaced by [`LifecycleService::notify_status`];
    /// transitions log it instead).
    #[error(transparent)]
    Email(#[from] EmailError),
}

/// What a transition request did.
#[derive(Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The order was already in the requested status; nothing happened.
    NoOp,
    /// The status was persisted; `email_sent` reports the best-effort
    /// notification.
    Updated { email_sent: bool },
    /// The request was a cancellation and was delegated to the workflow.
    Cancelled(CancelOutcome),
}

/// The lifecycle controller.
pub struct LifecycleService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    feed: &'a ChangeFeed,
    cancellation: CancellationService<'a>,
}

impl<'a> LifecycleService<'a> {
    /// Create a lifecycle controller over the shared collaborators.
    ///
    /// The gateway is only used when a transition delegates to the
    /// cancellation workflow.
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        gateway: &'a dyn PaymentGateway,
        mailer: &'a dyn Mailer,
        feed: &'a ChangeFeed,
    ) -> Self {
        Self {
            store,
            mailer,
            feed,
            cancellation: CancellationService::new(store, gateway, mailer, feed),
        }
    }

    /// Move an order to a new status.
    ///
    /// Same-status requests succeed without side effects. `cancelled` is
    /// delegated to the cancellation workflow. For everything else the edge
    /// must be legal, the new status is persisted, the change is broadcast,
    /// and the customer is notified by email - email failure is logged and
    /// never rolls the status back.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown orders, `InvalidTransition` for illegal edges,
    /// repository errors when the persistence write fails (in which case no
    /// notification is sent and the caller must reconcile any eagerly
    /// updated view back to the previous status).
    pub async fn transition(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<TransitionOutcome, TransitionError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(TransitionError::NotFound)?;

        if order.order.status == new_status {
            return Ok(TransitionOutcome::NoOp);
        }

        if new_status == OrderStatus::Cancelled {
            let outcome = self.cancellation.cancel(order_id).await?;
            return Ok(TransitionOutcome::Cancelled(outcome));
        }

        if !order.order.status.can_transition_to(new_status) {
            return Err(TransitionError::InvalidTransition {
                from: order.order.status,
                to: new_status,
            });
        }

        let updated = self.store.set_order_status(order_id, new_status).await?;
        if !updated {
            return Err(TransitionError::NotFound);
        }

        let mut order = order;
        order.order.status = new_status;
        self.feed
            .publish(ChangeEvent::order(FeedAction::Update, &order.order));

        let email_sent = match self.send_status_email(&order, new_status).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    status = %new_status,
                    error = %e,
                    "Status persisted but notification email failed"
                );
                false
            }
        };

        tracing::info!(order_id = %order_id, status = %new_status, "Order status updated");

        Ok(TransitionOutcome::Updated { email_sent })
    }

    /// Send the status notification email for an order, without touching
    /// the order itself.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown orders, `ContactNotFound` when the owner has
    /// no profile, and email errors from rendering or dispatch.
    pub async fn notify_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), TransitionError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(TransitionError::NotFound)?;

        self.send_status_email(&order, status).await
    }

    async fn send_status_email(
        &self,
        order: &OrderWithLines,
        status: OrderStatus,
    ) -> Result<(), TransitionError> {
        let profile = self
            .store
            .get_profile(order.order.user_id)
            .await?
            .ok_or(TransitionError::ContactNotFound)?;

        let rendered = email::status_update(order, status)?;
        self.mailer
            .send(&profile.email, &rendered.subject, &rendered.text, &rendered.html)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gilded_core::{Email, Money, UserId};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewOrder, NewOrderLine, NewProduct, Profile};
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

        fn lifecycle(&self) -> LifecycleService<'_> {
            LifecycleService::new(&self.store, &self.gateway, &self.mailer, &self.feed)
        }

        async fn seed_paid_order(&self) -> OrderId {
            self.store
                .upsert_profile(Profile {
                    user_id: UserId::new(1),
                    email: Email::parse("shopper@example.com").unwrap(),
                    full_name: None,
                    address: None,
                })
                .await
                .unwrap();
            let ring = self
                .store
                .insert_product(NewProduct {
                    name: "Ring".to_string(),
                    description: String::new(),
                    price: Money::new(10_000),
                    stock: 5,
                    category: "rings".to_string(),
                    image_url: None,
                })
                .await
                .unwrap();
            let order = self
                .store
                .create_order(
                    NewOrder {
                        payment_reference: "ORDER-lifecycle".to_string(),
                        user_id: UserId::new(1),
                        total_amount: Money::new(20_000),
                        shipping_address: "Jl. Example No. 1".to_string(),
                    },
                    vec![NewOrderLine {
                        product_id: ring.id,
                        quantity: 2,
                        price_at_purchase: Money::new(10_000),
                    }],
                )
                .await
                .unwrap();
            self.store
                .set_order_status(order.order.id, OrderStatus::Paid)
                .await
                .unwrap();
            order.order.id
        }
    }

    #[tokio::test]
    async fn test_paid_to_shipped_persists_and_sends_one_email() {
        let fx = Fixture::new();
        let order_id = fx.seed_paid_order().await;

        let outcome = fx
            .lifecycle()
            .transition(order_id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Updated { email_sent: true });

        let order = fx.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.order.status, OrderStatus::Shipped);

        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Order ORDER-lifecycle is now shipped");
        assert!(sent[0].html.contains("SHIPPED"));
    }

    #[tokio::test]
    async fn test_transition_persists_even_if_email_fails() {
        let fx = Fixture::new();
        let order_id = fx.seed_paid_order().await;
        fx.mailer.fail_sends();

        let outcome = fx
            .lifecycle()
            .transition(order_id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Updated { email_sent: false });

        let order = fx.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.order.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_same_status_is_noop_without_side_effects() {
        let fx = Fixture::new();
        let order_id = fx.seed_paid_order().await;

        let outcome = fx
            .lifecycle()
            .transition(order_id, OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::NoOp);
        assert!(fx.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_illegal_edge_is_rejected() {
        let fx = Fixture::new();
        let order_id = fx.seed_paid_order().await;

        let err = fx
            .lifecycle()
            .transition(order_id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition {
                from: OrderStatus::Paid,
                to: OrderStatus::Delivered,
            }
        ));
        assert!(fx.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let fx = Fixture::new();
        let err = fx
            .lifecycle()
            .transition(OrderId::new(999), OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotFound));
    }

    #[tokio::test]
    async fn test_cancelled_delegates_to_cancellation_workflow() {
        let fx = Fixture::new();
        let order_id = fx.seed_paid_order().await;

        let outcome = fx
            .lifecycle()
            .transition(order_id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            TransitionOutcome::Cancelled(CancelOutcome::Cancelled(_))
        ));

        // Refund issued, order erased - not a plain field update.
        assert_eq!(fx.gateway.refunds().len(), 1);
        assert!(fx.store.get_order(order_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_broadcasts_after_commit() {
        let fx = Fixture::new();
        let order_id = fx.seed_paid_order().await;
        let mut sub = fx.feed.subscribe(FeedFilter {
            table: Some(FeedTable::Orders),
            owner: None,
        });

        fx.lifecycle()
            .transition(order_id, OrderStatus::Shipped)
            .await
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.id, order_id.as_i32());
        assert_eq!(event.payload["status"], "shipped");
    }

    #[tokio::test]
    async fn test_notify_status_unknown_order() {
        let fx = Fixture::new();
        let err = fx
            .lifecycle()
            .notify_status(OrderId::new(999), OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotFound));
    }

    #[tokio::test]
    async fn test_notify_status_sends_without_mutating() {
        let fx = Fixture::new();
        let order_id = fx.seed_paid_order().await;

        fx.lifecycle()
            .notify_status(order_id, OrderStatus::Shipped)
            .await
            .unwrap();

        // Email only; the order itself is untouched.
        assert_eq!(fx.mailer.sent().len(), 1);
        let order = fx.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.order.status, OrderStatus::Paid);
    }
}
