//! Test doubles for the collaborator seams.
//!
//! The gateway and mailer are external systems; these doubles record every
//! call and can be scripted to fail, so workflow tests can assert the exact
//! side effects of checkout, lifecycle transitions, and cancellation. Wire
//! them together with [`crate::db::MemoryStore`] for a full in-process
//! storefront.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use gilded_core::{Email, Money};

use crate::services::email::{EmailError, Mailer};
use crate::services::gateway::{
    GatewayError, PaymentGateway, PaymentSession, SessionRequest,
};

/// A recorded refund call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRefund {
    /// Payment reference the refund targeted.
    pub payment_reference: String,
    /// Refunded amount.
    pub amount: Money,
}

/// Scriptable in-process payment gateway.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    fail_create_session: AtomicBool,
    fail_refund: AtomicBool,
    sessions: Mutex<Vec<String>>,
    refunds: Mutex<Vec<RecordedRefund>>,
}

impl ScriptedGateway {
    /// A gateway that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `create_session` calls fail.
    pub fn fail_create_session(&self) {
        self.fail_create_session.store(true, Ordering::SeqCst);
    }

    /// Make subsequent `refund` calls fail.
    pub fn fail_refund(&self) {
        self.fail_refund.store(true, Ordering::SeqCst);
    }

    /// Payment references passed to `create_session`, in call order.
    #[must_use]
    pub fn sessions(&self) -> Vec<String> {
        self.sessions.lock().expect("Mutex poisoned").clone()
    }

    /// Refunds issued, in call order.
    #[must_use]
    pub fn refunds(&self) -> Vec<RecordedRefund> {
        self.refunds.lock().expect("Mutex poisoned").clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        if self.fail_create_session.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 500,
                message: "session creation declined".to_owned(),
            });
        }

        self.sessions
            .lock()
            .expect("Mutex poisoned")
            .push(request.payment_reference.clone());

        Ok(PaymentSession {
            token: format!("token-{}", request.payment_reference),
            redirect_url: format!("https://pay.example/{}", request.payment_reference),
        })
    }

    async fn refund(&self, payment_reference: &str, amount: Money) -> Result<(), GatewayError> {
        if self.fail_refund.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 500,
                message: "refund declined".to_owned(),
            });
        }

        self.refunds.lock().expect("Mutex poisoned").push(RecordedRefund {
            payment_reference: payment_reference.to_owned(),
            amount,
        });
        Ok(())
    }
}

/// A recorded outgoing email.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// HTML body.
    pub html: String,
}

/// Recording in-process mailer.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    fail: AtomicBool,
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    /// A mailer that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail.
    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Emails sent so far, in call order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("Mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmailError::Send("smtp relay unavailable".to_owned()));
        }

        self.sent.lock().expect("Mutex poisoned").push(SentEmail {
            to: to.to_string(),
            subject: subject.to_owned(),
            text: text_body.to_owned(),
            html: html_body.to_owned(),
        });
        Ok(())
    }
}
