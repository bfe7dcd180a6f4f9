//! Payment gateway seam.
//!
//! The storefront knows three things about the gateway: it can open a
//! payment session for an order, the shopper completes (or abandons) that
//! session out-of-process, and it can refund a captured payment. Everything
//! else is gateway internals behind [`PaymentGateway`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gilded_core::{Email, Money};

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("gateway error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the gateway response.
    #[error("invalid gateway response: {0}")]
    Parse(String),
}

/// One item of a payment session, mirrored from an order line.
#[derive(Debug, Clone, Serialize)]
pub struct SessionItem {
    /// Product identifier as known to the storefront.
    pub id: String,
    /// Unit price in the smallest currency unit.
    pub price: i64,
    /// Units purchased.
    pub quantity: i32,
    /// Display name.
    pub name: String,
}

/// Request to open a payment session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// The order's payment reference, shared with the gateway.
    pub payment_reference: String,
    /// Gross amount to collect.
    pub gross_amount: Money,
    /// Line items.
    pub items: Vec<SessionItem>,
    /// Customer display name.
    pub customer_name: String,
    /// Customer contact address.
    pub customer_email: Email,
}

/// An opened payment session.
///
/// The token drives the gateway's client-side payment UI; the redirect URL
/// is the hosted fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Opaque payment handle.
    pub token: String,
    /// Hosted payment page URL.
    pub redirect_url: String,
}

/// Outcome reported by the out-of-process payment UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Payment captured.
    Success,
    /// Payment initiated but not settled yet.
    Pending,
    /// Payment failed.
    Error,
    /// Shopper closed the payment UI without paying.
    Close,
}

/// The payment gateway collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment session for an order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway rejects the request or is
    /// unreachable.
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError>;

    /// Refund a captured payment in full.
    ///
    /// An `Err` means the refund did not happen; callers must not proceed
    /// with any step that presumes returned funds.
    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<(), GatewayError>;
}
