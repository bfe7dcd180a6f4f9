//! Shopper profile domain type.

use serde::Serialize;

use gilded_core::{Email, UserId};

/// A shopper's profile.
///
/// Identity resolution (authentication, sessions) happens upstream; this is
/// the contact and shipping information the workflows need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// The shopper this profile belongs to.
    pub user_id: UserId,
    /// Contact address for order notifications.
    pub email: Email,
    /// Display name, if set.
    pub full_name: Option<String>,
    /// Last saved shipping address, if any.
    pub address: Option<String>,
}

impl Profile {
    /// Name to address the shopper by, falling back to the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or_else(|| self.email.as_str())
    }
}
