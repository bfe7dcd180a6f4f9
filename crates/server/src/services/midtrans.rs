//! Midtrans client for payment sessions and refunds.
//!
//! Talks to two Midtrans surfaces: Snap (`/snap/v1/transactions`) to open a
//! payment session, and the core API (`/v2/{order_id}/refund`) to refund a
//! captured payment. Both authenticate with HTTP Basic using the server key
//! as the username and an empty password.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use uuid::Uuid;

use gilded_core::Money;

use super::gateway::{GatewayError, PaymentGateway, PaymentSession, SessionRequest};
use crate::config::MidtransConfig;

/// Midtrans payment gateway client.
#[derive(Clone)]
pub struct MidtransGateway {
    client: reqwest::Client,
    snap_base_url: String,
    api_base_url: String,
}

/// Snap create-transaction response body.
#[derive(Debug, Deserialize)]
struct SnapTransactionResponse {
    token: String,
    redirect_url: String,
}

impl MidtransGateway {
    /// Create a new Midtrans client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MidtransConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();

        // Basic auth: base64("<server_key>:")
        let auth_value = format!(
            "Basic {}",
            BASE64.encode(format!("{}:", config.server_key.expose_secret()))
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| GatewayError::Parse(format!("invalid server key format: {e}")))?,
        );
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            snap_base_url: config.snap_base_url.trim_end_matches('/').to_owned(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let url = format!("{}/snap/v1/transactions", self.snap_base_url);

        let body = serde_json::json!({
            "transaction_details": {
                "order_id": &request.payment_reference,
                "gross_amount": request.gross_amount.amount(),
            },
            "item_details": &request.items,
            "customer_details": {
                "first_name": &request.customer_name,
                "email": request.customer_email.as_str(),
            },
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SnapTransactionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(PaymentSession {
            token: parsed.token,
            redirect_url: parsed.redirect_url,
        })
    }

    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<(), GatewayError> {
        let url = format!("{}/v2/{payment_reference}/refund", self.api_base_url);

        let body = serde_json::json!({
            "refund_key": format!("refund-{}", Uuid::new_v4()),
            "amount": amount.amount(),
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
