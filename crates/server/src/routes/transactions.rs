//! Checkout handlers: payment session creation and outcome confirmation.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use gilded_core::{OrderStatus, UserId};

use crate::error::Result;
use crate::services::checkout::CheckoutService;
use crate::services::gateway::PaymentOutcome;
use crate::state::AppState;

/// Input for starting a checkout.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionInput {
    /// The shopper checking out.
    pub user_id: i32,
    /// Shipping address for the order.
    pub shipping_address: String,
}

/// Response for a started checkout.
#[derive(Debug, Serialize)]
pub struct CreateTransactionResponse {
    /// Always `true` on the success path.
    pub success: bool,
    /// The created (pending) order.
    pub order_id: i32,
    /// Reference shared with the payment gateway.
    pub payment_reference: String,
    /// Opaque payment handle for the gateway's client-side UI.
    pub token: String,
    /// Hosted payment page URL.
    pub redirect_url: String,
}

/// Input reporting the payment UI outcome.
#[derive(Debug, Deserialize)]
pub struct ConfirmTransactionInput {
    /// Reference of the order being paid.
    pub payment_reference: String,
    /// Which callback the payment UI fired.
    pub result: PaymentOutcome,
}

/// Response for a confirmed (or advisory) outcome.
#[derive(Debug, Serialize)]
pub struct ConfirmTransactionResponse {
    /// Always `true` when the outcome was processed.
    pub success: bool,
    /// The order's status afterwards.
    pub status: OrderStatus,
    /// Advisory message for the shopper.
    pub message: String,
}

/// Create a payment session for the shopper's cached cart.
///
/// POST /transactions
#[instrument(skip(state, input), fields(user_id = input.user_id))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateTransactionInput>,
) -> Result<Json<CreateTransactionResponse>> {
    let checkout = CheckoutService::new(
        state.store(),
        state.gateway(),
        state.mailer(),
        state.feed(),
    );

    let started = checkout
        .begin(UserId::new(input.user_id), &input.shipping_address)
        .await?;

    Ok(Json(CreateTransactionResponse {
        success: true,
        order_id: started.order.order.id.as_i32(),
        payment_reference: started.order.order.payment_reference,
        token: started.session.token,
        redirect_url: started.session.redirect_url,
    }))
}

/// Report the outcome of the out-of-process payment UI.
///
/// POST /transactions/confirm
#[instrument(skip(state, input), fields(payment_reference = %input.payment_reference))]
pub async fn confirm(
    State(state): State<AppState>,
    Json(input): Json<ConfirmTransactionInput>,
) -> Result<Json<ConfirmTransactionResponse>> {
    let checkout = CheckoutService::new(
        state.store(),
        state.gateway(),
        state.mailer(),
        state.feed(),
    );

    let result = checkout
        .confirm(&input.payment_reference, input.result)
        .await?;

    Ok(Json(ConfirmTransactionResponse {
        success: true,
        status: result.status,
        message: result.message.to_owned(),
    }))
}
