//! End-to-end cancellation over the HTTP surface.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use gilded_integration_tests::TestApp;

/// Seed, checkout, and pay for `quantity` units; returns the order id.
async fn paid_order(app: &TestApp, user_id: i32, product_id: i32, quantity: i32) -> i64 {
    let (status, _) = app
        .post(
            "/cart/add",
            json!({ "user_id": user_id, "product_id": product_id, "quantity": quantity }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .post(
            "/transactions",
            json!({ "user_id": user_id, "shipping_address": "Jl. Example No. 1" }),
        )
        .await;
    let reference = body["payment_reference"].as_str().unwrap().to_owned();
    let order_id = body["order_id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/transactions/confirm",
            json!({ "payment_reference": reference, "result": "success" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    order_id
}

#[tokio::test]
async fn cancel_round_trip_restores_stock_and_erases_order() {
    let app = TestApp::new();
    app.seed_shopper(1, "shopper@example.com").await;
    let product = app.seed_product("Gold Ring", 10_000, 5).await;

    let order_id = paid_order(&app, 1, product.id.as_i32(), 3).await;

    // Paid: stock down to 2.
    let (_, products) = app.get("/products").await;
    assert_eq!(products[0]["stock"], 2);

    let (status, body) = app.post("/orders/cancel", json!({ "orderId": order_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["already_cancelled"], false);
    assert_eq!(body["report"]["refunded"], 30_000);
    assert_eq!(body["report"]["lines_restored"], 1);
    assert_eq!(body["report"]["deleted"], true);

    // Refund issued in full against the gateway.
    let refunds = app.gateway.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount.amount(), 30_000);

    // Stock restored by exactly the quantity sold.
    let (_, products) = app.get("/products").await;
    assert_eq!(products[0]["stock"], 5);

    // The order is unresolvable in every view.
    let (_, orders) = app.get("/orders").await;
    assert!(orders.as_array().unwrap().is_empty());
    let (_, orders) = app.get("/orders?user_id=1").await;
    assert!(orders.as_array().unwrap().is_empty());

    // Two emails total: confirmation at payment, refund notice at cancel.
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].subject.starts_with("Refund Processed - "));
    assert!(sent[1].html.contains("Rp 30.000"));
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let app = TestApp::new();
    app.seed_shopper(1, "shopper@example.com").await;
    let product = app.seed_product("Gold Ring", 10_000, 5).await;
    let order_id = paid_order(&app, 1, product.id.as_i32(), 2).await;

    let (status, first) = app.post("/orders/cancel", json!({ "orderId": order_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["already_cancelled"], false);

    // Re-invoking on the erased order is a no-op, not an error.
    let (status, second) = app.post("/orders/cancel", json!({ "orderId": order_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], true);
    assert_eq!(second["already_cancelled"], true);

    // One refund, one restore: stock is back to 5, not 7.
    assert_eq!(app.gateway.refunds().len(), 1);
    let (_, products) = app.get("/products").await;
    assert_eq!(products[0]["stock"], 5);
}

#[tokio::test]
async fn refund_failure_aborts_everything() {
    let app = TestApp::new();
    app.seed_shopper(1, "shopper@example.com").await;
    let product = app.seed_product("Gold Ring", 10_000, 5).await;
    let order_id = paid_order(&app, 1, product.id.as_i32(), 3).await;
    let emails_before = app.mailer.sent().len();

    app.gateway.fail_refund();

    let (status, body) = app.post("/orders/cancel", json!({ "orderId": order_id })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("gateway"));

    // Order intact, stock untouched, no refund email.
    let (_, orders) = app.get("/orders").await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["status"], "paid");
    let (_, products) = app.get("/products").await;
    assert_eq!(products[0]["stock"], 2);
    assert_eq!(app.mailer.sent().len(), emails_before);
}

#[tokio::test]
async fn cancel_skips_deleted_products() {
    let app = TestApp::new();
    app.seed_shopper(1, "shopper@example.com").await;
    let ring = app.seed_product("Gold Ring", 10_000, 5).await;
    let chain = app.seed_product("Figaro Chain", 20_000, 4).await;

    // One order with both products.
    for (product, quantity) in [(&ring, 1), (&chain, 1)] {
        app.post(
            "/cart/add",
            json!({ "user_id": 1, "product_id": product.id.as_i32(), "quantity": quantity }),
        )
        .await;
    }
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

    // The chain is discontinued before the cancellation.
    let (status, _) = app
        .request("DELETE", &format!("/products/{}", chain.id.as_i32()), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post("/orders/cancel", json!({ "orderId": order_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["lines_restored"], 1);
    assert_eq!(body["report"]["lines_skipped"], 1);
    assert_eq!(body["report"]["deleted"], true);

    // The surviving product got its unit back.
    let (_, products) = app.get("/products").await;
    let ring_row = products
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "Gold Ring")
        .unwrap();
    assert_eq!(ring_row["stock"], 5);
}
