//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::email::Mailer;
use crate::services::gateway::PaymentGateway;
use crate::services::notify::ChangeFeed;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The store, gateway, and mailer are held
/// behind their collaborator traits so tests wire in the in-memory store
/// and scripted doubles through the same state type.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    feed: ChangeFeed,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                gateway,
                mailer,
                feed: ChangeFeed::default(),
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the data store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the payment gateway.
    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    /// Get a reference to the mailer.
    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    /// Get a reference to the change feed.
    #[must_use]
    pub fn feed(&self) -> &ChangeFeed {
        &self.inner.feed
    }
}
