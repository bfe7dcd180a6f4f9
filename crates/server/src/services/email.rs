//! Email sending and the transactional templates.
//!
//! Uses SMTP via lettre for delivery with Askama HTML + plain text
//! templates. Workflows treat email as fire-and-forget: a failed send is
//! logged by the caller and never rolls back a committed status change or a
//! processed refund.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use gilded_core::{Email, Money, OrderStatus};

use crate::config::EmailConfig;
use crate::models::{OrderLine, OrderWithLines};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Send was refused by the transport.
    #[error("Send failed: {0}")]
    Send(String),
}

/// The email sender collaborator.
///
/// One low-level operation, `send(to, subject, bodies)`; subjects and bodies
/// are composed by [`render`].
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a multipart email (plain text + HTML).
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError>;
}

/// SMTP-backed mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay configuration is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// A fully rendered email, ready for [`Mailer::send`].
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// HTML body.
    pub html: String,
}

/// One line of an order as it appears in an email body.
struct EmailLine {
    name: String,
    quantity: i32,
    total: String,
}

impl From<&OrderLine> for EmailLine {
    fn from(line: &OrderLine) -> Self {
        Self {
            name: line.display_name().to_owned(),
            quantity: line.quantity,
            total: line.line_total().to_string(),
        }
    }
}

/// HTML template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml {
    reference: String,
    address: String,
    items: Vec<EmailLine>,
    total: String,
}

/// Plain text template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText {
    reference: String,
    address: String,
    items: Vec<EmailLine>,
    total: String,
}

/// HTML template for the status update email.
#[derive(Template)]
#[template(path = "email/status_update.html")]
struct StatusUpdateHtml {
    reference: String,
    status: String,
    address: String,
    items: Vec<EmailLine>,
    total: String,
}

/// Plain text template for the status update email.
#[derive(Template)]
#[template(path = "email/status_update.txt")]
struct StatusUpdateText {
    reference: String,
    status: String,
    address: String,
    items: Vec<EmailLine>,
    total: String,
}

/// HTML template for the refund confirmation email.
#[derive(Template)]
#[template(path = "email/refund_confirmation.html")]
struct RefundConfirmationHtml {
    reference: String,
    refund_amount: String,
    items: Vec<EmailLine>,
}

/// Plain text template for the refund confirmation email.
#[derive(Template)]
#[template(path = "email/refund_confirmation.txt")]
struct RefundConfirmationText {
    reference: String,
    refund_amount: String,
    items: Vec<EmailLine>,
}

fn email_lines(order: &OrderWithLines) -> Vec<EmailLine> {
    order.lines.iter().map(EmailLine::from).collect()
}

/// Render the order confirmation email (sent when payment is confirmed).
///
/// # Errors
///
/// Returns error if a template fails to render.
pub fn order_confirmation(order: &OrderWithLines) -> Result<RenderedEmail, EmailError> {
    let reference = order.order.payment_reference.clone();
    let address = order.order.shipping_address.clone();
    let total = order.order.total_amount.to_string();

    let html = OrderConfirmationHtml {
        reference: reference.clone(),
        address: address.clone(),
        items: email_lines(order),
        total: total.clone(),
    }
    .render()?;
    let text = OrderConfirmationText {
        reference: reference.clone(),
        address,
        items: email_lines(order),
        total,
    }
    .render()?;

    Ok(RenderedEmail {
        subject: format!("Order Confirmation - {reference}"),
        text,
        html,
    })
}

/// Render the status update email for a lifecycle transition.
///
/// # Errors
///
/// Returns error if a template fails to render.
pub fn status_update(
    order: &OrderWithLines,
    status: OrderStatus,
) -> Result<RenderedEmail, EmailError> {
    let reference = order.order.payment_reference.clone();
    let status_display = status.to_string().to_uppercase();
    let address = order.order.shipping_address.clone();
    let total = order.order.total_amount.to_string();

    let html = StatusUpdateHtml {
        reference: reference.clone(),
        status: status_display.clone(),
        address: address.clone(),
        items: email_lines(order),
        total: total.clone(),
    }
    .render()?;
    let text = StatusUpdateText {
        reference: reference.clone(),
        status: status_display,
        address,
        items: email_lines(order),
        total,
    }
    .render()?;

    Ok(RenderedEmail {
        subject: format!("Order {reference} is now {status}"),
        text,
        html,
    })
}

/// Render the refund confirmation email (sent by the cancellation workflow).
///
/// # Errors
///
/// Returns error if a template fails to render.
pub fn refund_confirmation(
    order: &OrderWithLines,
    refunded: Money,
) -> Result<RenderedEmail, EmailError> {
    let reference = order.order.payment_reference.clone();
    let refund_amount = refunded.to_string();

    let html = RefundConfirmationHtml {
        reference: reference.clone(),
        refund_amount: refund_amount.clone(),
        items: email_lines(order),
    }
    .render()?;
    let text = RefundConfirmationText {
        reference: reference.clone(),
        refund_amount,
        items: email_lines(order),
    }
    .render()?;

    Ok(RenderedEmail {
        subject: format!("Refund Processed - {reference}"),
        text,
        html,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use gilded_core::{OrderId, OrderLineId, OrderStatus, ProductId, UserId};

    use super::*;
    use crate::models::Order;

    fn order() -> OrderWithLines {
        OrderWithLines {
            order: Order {
                id: OrderId::new(1),
                payment_reference: "ORDER-test-ref".to_string(),
                user_id: UserId::new(1),
                status: OrderStatus::Paid,
                total_amount: Money::new(30_000),
                shipping_address: "Jl. Example No. 1".to_string(),
                created_at: Utc::now(),
            },
            lines: vec![OrderLine {
                id: OrderLineId::new(1),
                order_id: OrderId::new(1),
                product_id: ProductId::new(1),
                quantity: 3,
                price_at_purchase: Money::new(10_000),
                product_name: Some("Gold Ring".to_string()),
            }],
        }
    }

    #[test]
    fn test_order_confirmation_renders() {
        let rendered = order_confirmation(&order()).unwrap();
        assert_eq!(rendered.subject, "Order Confirmation - ORDER-test-ref");
        assert!(rendered.html.contains("Gold Ring x 3"));
        assert!(rendered.html.contains("Rp 30.000"));
        assert!(rendered.text.contains("Jl. Example No. 1"));
    }

    #[test]
    fn test_status_update_uppercases_status() {
        let rendered = status_update(&order(), OrderStatus::Shipped).unwrap();
        assert_eq!(rendered.subject, "Order ORDER-test-ref is now shipped");
        assert!(rendered.html.contains("SHIPPED"));
        assert!(rendered.text.contains("SHIPPED"));
    }

    #[test]
    fn test_refund_confirmation_includes_amount_and_lines() {
        let rendered = refund_confirmation(&order(), Money::new(30_000)).unwrap();
        assert_eq!(rendered.subject, "Refund Processed - ORDER-test-ref");
        assert!(rendered.html.contains("Rp 30.000"));
        assert!(rendered.html.contains("Gold Ring x 3"));
    }

    #[test]
    fn test_line_name_falls_back_when_product_gone() {
        let mut o = order();
        o.lines[0].product_name = None;
        let rendered = status_update(&o, OrderStatus::Shipped).unwrap();
        assert!(rendered.text.contains("Item x 3"));
    }
}
