//! Status notification handler (email only, no order mutation).

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use gilded_core::{OrderId, OrderStatus};

use crate::error::Result;
use crate::services::lifecycle::LifecycleService;
use crate::state::AppState;

/// Input for sending a status email.
#[derive(Debug, Deserialize)]
pub struct OrderStatusInput {
    /// Order to notify about.
    #[serde(rename = "orderId")]
    pub order_id: i32,
    /// Status to announce.
    pub status: OrderStatus,
}

/// Send the status notification email for an order.
///
/// POST /notifications/order-status
#[instrument(skip(state, input), fields(order_id = input.order_id, status = %input.status))]
pub async fn order_status(
    State(state): State<AppState>,
    Json(input): Json<OrderStatusInput>,
) -> Result<Json<serde_json::Value>> {
    let lifecycle = LifecycleService::new(
        state.store(),
        state.gateway(),
        state.mailer(),
        state.feed(),
    );

    lifecycle
        .notify_status(OrderId::new(input.order_id), input.status)
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
