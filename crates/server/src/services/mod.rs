//! Business services.
//!
//! Each service is built from `Arc<dyn ...>` storage handles (see
//! [`crate::store`]) and a [`Clock`](crate::clock::Clock), never from a pool
//! directly, so the same code runs against `PostgreSQL` and the in-memory fake.
//!
//! - [`sessions`] - bearer token issue / resolve / refresh / sweep
//! - [`auth`] - password credentials and admin bootstrap
//! - [`inventory`] - stock reservation and restock
//! - [`orders`] - order fulfillment and status transitions
//! - [`audit`] - append-only activity log

pub mod audit;
pub mod auth;
pub mod inventory;
pub mod orders;
pub mod sessions;

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::store::Backend;

pub use audit::AuditSink;
pub use auth::{AuthError, CredentialStore};
pub use inventory::{InventoryLedger, LedgerError};
pub use orders::{CartLine, FulfillmentEngine, OrderError};
pub use sessions::SessionTokenManager;

/// Default lifetime of an issued session token.
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Default upper bound on a single storage call.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables shared by the services.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// How long an issued or refreshed token stays live.
    pub session_ttl: chrono::Duration,
    /// Upper bound on every storage call made by a service.
    pub storage_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            session_ttl: chrono::Duration::days(DEFAULT_SESSION_TTL_DAYS),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }
}

/// Every service, wired over one backend and clock.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<SessionTokenManager>,
    pub credentials: Arc<CredentialStore>,
    pub inventory: Arc<InventoryLedger>,
    pub orders: Arc<FulfillmentEngine>,
    pub audit: Arc<AuditSink>,
}

impl Services {
    /// Wire the services over `backend`.
    #[must_use]
    pub fn new(backend: &Backend, clock: Arc<dyn Clock>, settings: ServiceSettings) -> Self {
        let audit = Arc::new(AuditSink::new(
            Arc::clone(&backend.audit),
            Arc::clone(&clock),
            settings.storage_timeout,
        ));
        let sessions = Arc::new(SessionTokenManager::new(
            Arc::clone(&backend.tokens),
            Arc::clone(&backend.principals),
            Arc::clone(&clock),
            settings,
        ));
        let credentials = Arc::new(CredentialStore::new(
            Arc::clone(&backend.principals),
            Arc::clone(&sessions),
            Arc::clone(&audit),
            Arc::clone(&clock),
            settings.storage_timeout,
        ));
        let inventory = Arc::new(InventoryLedger::new(
            Arc::clone(&backend.stock),
            Arc::clone(&backend.catalog),
            Arc::clone(&audit),
            settings.storage_timeout,
        ));
        let orders = Arc::new(FulfillmentEngine::new(
            Arc::clone(&backend.orders),
            Arc::clone(&backend.catalog),
            Arc::clone(&audit),
            clock,
            settings.storage_timeout,
        ));

        Self {
            sessions,
            credentials,
            inventory,
            orders,
            audit,
        }
    }
}
