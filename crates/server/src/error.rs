//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`; failures become JSON
//! `{"error": "..."}` bodies with a non-2xx status, and server-class errors
//! are captured to Sentry before responding. Internal details never reach
//! the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::cancellation::CancellationError;
use crate::services::checkout::CheckoutError;
use crate::services::email::EmailError;
use crate::services::gateway::GatewayError;
use crate::services::lifecycle::TransitionError;

/// Application-level error type for the storefront service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Data store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment gateway operation failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Email dispatch failed where it is the requested operation itself.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart | CheckoutError::MissingAddress => {
                Self::BadRequest(err.to_string())
            }
            CheckoutError::ProfileNotFound => Self::NotFound("customer profile".to_owned()),
            CheckoutError::OrderNotFound(reference) => {
                Self::NotFound(format!("order {reference}"))
            }
            CheckoutError::Repository(e) => Self::Database(e),
            CheckoutError::Gateway(e) => Self::Gateway(e),
        }
    }
}

impl From<CancellationError> for AppError {
    fn from(err: CancellationError) -> Self {
        match err {
            CancellationError::ContactNotFound => Self::NotFound("user email".to_owned()),
            CancellationError::NotCancellable(_) => Self::BadRequest(err.to_string()),
            CancellationError::Repository(e) => Self::Database(e),
            CancellationError::Refund(e) => Self::Gateway(e),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotFound => Self::NotFound("order".to_owned()),
            TransitionError::ContactNotFound => Self::NotFound("user email".to_owned()),
            TransitionError::InvalidTransition { .. } => Self::BadRequest(err.to_string()),
            TransitionError::Repository(e) => Self::Database(e),
            TransitionError::Cancellation(e) => e.into(),
            TransitionError::Email(e) => Self::Email(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_) | Self::Gateway(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) | Self::Email(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Gateway(_) => "Payment gateway error".to_string(),
            Self::Email(_) => "Failed to send email".to_string(),
            _ => self.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
