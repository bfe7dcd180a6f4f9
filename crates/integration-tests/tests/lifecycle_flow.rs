//! Lifecycle transitions and notifications over the HTTP surface.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use gilded_core::UserId;
use gilded_server::db::Store;
use gilded_server::services::notify::{FeedFilter, FeedTable};
use gilded_integration_tests::TestApp;

/// Seed, checkout, and pay; returns the order id.
async fn paid_order(app: &TestApp) -> i64 {
    app.seed_shopper(1, "shopper@example.com").await;
    let product = app.seed_product("Gold Ring", 10_000, 5).await;

    app.post(
        "/cart/add",
        json!({ "user_id": 1, "product_id": product.id.as_i32(), "quantity": 2 }),
    )
    .await;
    let (_, body) = app
        .post(
            "/transactions",
            json!({ "user_id": 1, "shipping_address": "Jl. Example No. 1" }),
        )
        .await;
    let reference = body["payment_reference"].as_str().unwrap().to_owned();
    let order_id = body["order_id"].as_i64().unwrap();
    app.post(
        "/transactions/confirm",
        json!({ "payment_reference": reference, "result": "success" }),
    )
    .await;
    order_id
}

#[tokio::test]
async fn paid_to_shipped_sends_exactly_one_status_email() {
    let app = TestApp::new();
    let order_id = paid_order(&app).await;
    let emails_before = app.mailer.sent().len();

    let (status, body) = app
        .post(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["email_sent"], true);

    let (_, orders) = app.get("/orders").await;
    assert_eq!(orders[0]["status"], "shipped");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), emails_before + 1);
    let email = sent.last().unwrap();
    assert!(email.subject.ends_with("is now shipped"));
    assert!(email.html.contains("SHIPPED"));
}

#[tokio::test]
async fn transition_persists_when_email_fails() {
    let app = TestApp::new();
    let order_id = paid_order(&app).await;
    app.mailer.fail_sends();

    let (status, body) = app
        .post(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["email_sent"], false);

    let (_, orders) = app.get("/orders").await;
    assert_eq!(orders[0]["status"], "shipped");
}

#[tokio::test]
async fn same_status_is_a_noop() {
    let app = TestApp::new();
    let order_id = paid_order(&app).await;
    let emails_before = app.mailer.sent().len();

    let (status, body) = app
        .post(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "paid" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
    assert_eq!(app.mailer.sent().len(), emails_before);
}

#[tokio::test]
async fn illegal_edges_are_rejected() {
    let app = TestApp::new();
    let order_id = paid_order(&app).await;

    let (status, body) = app
        .post(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid status transition"));
}

#[tokio::test]
async fn cancelled_status_runs_the_full_workflow() {
    let app = TestApp::new();
    let order_id = paid_order(&app).await;

    let (status, body) = app
        .post(
            &format!("/orders/{order_id}/status"),
            json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["cancellation"]["deleted"], true);

    // Refund issued and the order erased - not a plain field update.
    assert_eq!(app.gateway.refunds().len(), 1);
    let (_, orders) = app.get("/orders").await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn notification_endpoint_sends_without_mutating() {
    let app = TestApp::new();
    let order_id = paid_order(&app).await;
    let emails_before = app.mailer.sent().len();

    let (status, body) = app
        .post(
            "/notifications/order-status",
            json!({ "orderId": order_id, "status": "shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.mailer.sent().len(), emails_before + 1);

    // The order itself did not move.
    let (_, orders) = app.get("/orders").await;
    assert_eq!(orders[0]["status"], "paid");
}

#[tokio::test]
async fn notification_endpoint_unknown_order_is_404() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/notifications/order-status",
            json!({ "orderId": 999, "status": "shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("order"));
}

#[tokio::test]
async fn live_viewers_converge_via_the_change_feed() {
    let app = TestApp::new();
    let order_id = paid_order(&app).await;

    // A shopper watching their own orders and an admin watching all.
    let mut shopper_view = app.state.feed().subscribe(FeedFilter {
        table: Some(FeedTable::Orders),
        owner: Some(UserId::new(1)),
    });
    let mut admin_view = app.state.feed().subscribe(FeedFilter {
        table: Some(FeedTable::Orders),
        owner: None,
    });

    app.post(
        &format!("/orders/{order_id}/status"),
        json!({ "status": "shipped" }),
    )
    .await;

    let shopper_event = shopper_view.recv().await.unwrap();
    assert_eq!(shopper_event.payload["status"], "shipped");

    let admin_event = admin_view.recv().await.unwrap();
    assert_eq!(i64::from(admin_event.id), order_id);
    assert_eq!(admin_event.payload["status"], "shipped");
}

#[tokio::test]
async fn another_users_cart_stays_isolated() {
    let app = TestApp::new();
    app.seed_shopper(1, "first@example.com").await;
    app.seed_shopper(2, "second@example.com").await;
    let product = app.seed_product("Gold Ring", 10_000, 5).await;

    app.post(
        "/cart/add",
        json!({ "user_id": 1, "product_id": product.id.as_i32() }),
    )
    .await;

    let (_, first) = app.get("/cart?user_id=1").await;
    let (_, second) = app.get("/cart?user_id=2").await;
    assert_eq!(first["lines"].as_array().unwrap().len(), 1);
    assert!(second["lines"].as_array().unwrap().is_empty());

    // Hydration survives a "reload": the cache is re-read, not session state.
    let (_, reloaded) = app.get("/cart?user_id=1").await;
    assert_eq!(reloaded["lines"], first["lines"]);
}

#[tokio::test]
async fn store_ping_is_healthy() {
    let app = TestApp::new();
    app.store.ping().await.unwrap();
}
