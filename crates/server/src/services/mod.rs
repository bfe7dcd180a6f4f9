//! Workflow services and external collaborators.
//!
//! - [`gateway`] / [`midtrans`] - payment gateway seam and its HTTP client
//! - [`email`] - mailer seam, SMTP transport, and the transactional templates
//! - [`notify`] - broadcast change feed for live order/product viewers
//! - [`checkout`] - cart to payable order, payment session, confirmation
//! - [`lifecycle`] - status state machine and customer notification
//! - [`cancellation`] - compensating transaction: refund, restock, notify,
//!   delete

pub mod cancellation;
pub mod checkout;
pub mod email;
pub mod gateway;
pub mod lifecycle;
pub mod midtrans;
pub mod notify;
