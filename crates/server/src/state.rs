//! Application state shared across handlers.

use std::sync::Arc;

use crate::clock::Clock;
use crate::services::{
    AuditSink, CredentialStore, FulfillmentEngine, InventoryLedger, ServiceSettings,
    SessionTokenManager, Services,
};
use crate::store::Backend;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Built from a storage [`Backend`] so tests can
/// hand the router an in-memory store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    backend: Backend,
    clock: Arc<dyn Clock>,
    services: Services,
}

impl AppState {
    /// Wire the services over `backend`.
    #[must_use]
    pub fn new(backend: Backend, clock: Arc<dyn Clock>, settings: ServiceSettings) -> Self {
        let services = Services::new(&backend, Arc::clone(&clock), settings);

        Self {
            inner: Arc::new(AppStateInner {
                backend,
                clock,
                services,
            }),
        }
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Get a reference to the clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionTokenManager> {
        &self.inner.services.sessions
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.services.credentials
    }

    #[must_use]
    pub fn inventory(&self) -> &Arc<InventoryLedger> {
        &self.inner.services.inventory
    }

    #[must_use]
    pub fn orders(&self) -> &Arc<FulfillmentEngine> {
        &self.inner.services.orders
    }

    #[must_use]
    pub fn audit(&self) -> &Arc<AuditSink> {
        &self.inner.services.audit
    }
}
