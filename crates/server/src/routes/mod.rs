//! HTTP route handlers for the storefront service.
//!
//! JSON in, JSON out; failures are `{"error": "..."}` bodies with a non-2xx
//! status. Identity arrives as an already-resolved `user_id` - the surface
//! is internal, service-to-service.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET    /products                - Product listing
//! POST   /products                - Create product (admin)
//! PATCH  /products/{id}           - Edit product (admin)
//! DELETE /products/{id}           - Delete product (admin)
//!
//! # Cart (per-user persisted cache)
//! GET  /cart?user_id=X            - Load the cached cart
//! PUT  /cart                      - Replace the cart atomically
//! POST /cart/add                  - Add a product (merge, stock-capped)
//! POST /cart/increase             - Bump a line by one
//! POST /cart/decrease             - Drop a line by one (removes below 1)
//! POST /cart/clear                - Empty the cart
//!
//! # Checkout
//! POST /transactions              - Create order + payment session
//! POST /transactions/confirm      - Report the payment UI outcome
//!
//! # Orders
//! GET  /orders?user_id=X          - Order listing (all, or one owner's)
//! POST /orders/{id}/status        - Lifecycle transition
//! POST /orders/cancel             - Cancellation workflow
//!
//! # Notifications
//! POST /notifications/order-status - Send the status email alone
//!
//! # Change feed
//! GET  /events                    - SSE stream of order/product mutations
//! ```

use axum::Router;
use axum::routing::{get, patch, post};

use crate::state::AppState;

pub mod cart;
pub mod events;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod transactions;

/// Build the service router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(products::list).post(products::create),
        )
        .route(
            "/products/{id}",
            patch(products::update).delete(products::delete),
        )
        .route("/cart", get(cart::load).put(cart::replace))
        .route("/cart/add", post(cart::add))
        .route("/cart/increase", post(cart::increase))
        .route("/cart/decrease", post(cart::decrease))
        .route("/cart/clear", post(cart::clear))
        .route("/transactions", post(transactions::create))
        .route("/transactions/confirm", post(transactions::confirm))
        .route("/orders", get(orders::list))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/orders/cancel", post(orders::cancel))
        .route(
            "/notifications/order-status",
            post(notifications::order_status),
        )
        .route("/events", get(events::stream))
}
