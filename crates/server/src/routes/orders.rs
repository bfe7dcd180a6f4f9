//! Order listing, lifecycle transitions, and cancellation handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use gilded_core::{OrderId, OrderStatus, UserId};

use crate::error::Result;
use crate::models::OrderWithLines;
use crate::services::cancellation::{
    CancelOutcome, CancellationReport, CancellationService,
};
use crate::services::lifecycle::{LifecycleService, TransitionOutcome};
use crate::state::AppState;

/// Query for the order listing.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    /// Restrict to one owner's orders (shopper view); absent = all (admin).
    pub user_id: Option<i32>,
}

/// Input for a lifecycle transition.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    /// Requested status.
    pub status: OrderStatus,
}

/// Response for a lifecycle transition.
#[derive(Debug, Serialize)]
pub struct UpdateStatusResponse {
    /// Always `true` when the request was handled.
    pub success: bool,
    /// Whether anything changed (same-status requests are no-ops).
    pub changed: bool,
    /// Whether the notification email went out (transitions only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
    /// Cancellation report when the transition was delegated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationReport>,
}

/// Input for the cancellation workflow.
#[derive(Debug, Deserialize)]
pub struct CancelOrderInput {
    /// Order to cancel.
    #[serde(rename = "orderId")]
    pub order_id: i32,
}

/// Response for the cancellation workflow.
///
/// The workflow is not globally transactional: the report carries how far
/// cleanup got, so callers can present "refund processed, cleanup may be
/// incomplete" instead of implying atomicity.
#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    /// Always `true` when the workflow ran (or had nothing to do).
    pub success: bool,
    /// `true` when the order was already gone and nothing was done.
    pub already_cancelled: bool,
    /// Step-by-step record when the workflow ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CancellationReport>,
}

/// List orders, newest first, optionally one owner's.
///
/// GET /orders?user_id=X
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<OrderWithLines>>> {
    let owner = query.user_id.map(UserId::new);
    let orders = state.store().list_orders(owner).await?;
    Ok(Json(orders))
}

/// Run a lifecycle transition (admin).
///
/// POST /orders/{id}/status
#[instrument(skip(state, input), fields(status = %input.status))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<UpdateStatusInput>,
) -> Result<Json<UpdateStatusResponse>> {
    let lifecycle = LifecycleService::new(
        state.store(),
        state.gateway(),
        state.mailer(),
        state.feed(),
    );

    let outcome = lifecycle
        .transition(OrderId::new(id), input.status)
        .await?;

    let response = match outcome {
        TransitionOutcome::NoOp => UpdateStatusResponse {
            success: true,
            changed: false,
            email_sent: None,
            cancellation: None,
        },
        TransitionOutcome::Updated { email_sent } => UpdateStatusResponse {
            success: true,
            changed: true,
            email_sent: Some(email_sent),
            cancellation: None,
        },
        TransitionOutcome::Cancelled(outcome) => {
            let report = match outcome {
                CancelOutcome::Cancelled(report) => Some(report),
                CancelOutcome::AlreadyCancelled => None,
            };
            UpdateStatusResponse {
                success: true,
                changed: true,
                email_sent: None,
                cancellation: report,
            }
        }
    };

    Ok(Json(response))
}

/// Run the cancellation workflow (admin).
///
/// POST /orders/cancel
#[instrument(skip(state, input), fields(order_id = input.order_id))]
pub async fn cancel(
    State(state): State<AppState>,
    Json(input): Json<CancelOrderInput>,
) -> Result<Json<CancelOrderResponse>> {
    let cancellation = CancellationService::new(
        state.store(),
        state.gateway(),
        state.mailer(),
        state.feed(),
    );

    let outcome = cancellation.cancel(OrderId::new(input.order_id)).await?;

    let response = match outcome {
        CancelOutcome::Cancelled(report) => CancelOrderResponse {
            success: true,
            already_cancelled: false,
            report: Some(report),
        },
        CancelOutcome::AlreadyCancelled => CancelOrderResponse {
            success: true,
            already_cancelled: true,
            report: None,
        },
    };

    Ok(Json(response))
}
