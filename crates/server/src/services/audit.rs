//! Audit sink.
//!
//! Recording is best effort: a failed append is logged and dropped so the
//! admin action that triggered it still succeeds.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use shopfront_core::PrincipalId;

use crate::clock::Clock;
use crate::models::{ActivityLog, AuditAction, NewActivity};
use crate::store::{AuditStore, StoreError, bounded};

/// Append-only activity log keyed by acting principal.
pub struct AuditSink {
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AuditSink {
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            store,
            clock,
            timeout,
        }
    }

    /// Append an entry stamped with the current time. Never fails.
    pub async fn record(
        &self,
        actor: Option<PrincipalId>,
        action: AuditAction,
        details: impl Into<String>,
    ) {
        let entry = NewActivity {
            actor_id: actor,
            action,
            details: details.into(),
            recorded_at: self.clock.now(),
        };

        if let Err(e) = bounded(self.timeout, self.store.append(entry)).await {
            warn!(
                error = %e,
                action = %action,
                actor_id = ?actor,
                "Failed to record activity"
            );
        }
    }

    /// Every entry, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if storage fails.
    pub async fn list_all(&self) -> Result<Vec<ActivityLog>, StoreError> {
        bounded(self.timeout, self.store.list_all()).await
    }

    /// Entries recorded by `actor`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if storage fails.
    pub async fn list_by_actor(&self, actor: PrincipalId) -> Result<Vec<ActivityLog>, StoreError> {
        bounded(self.timeout, self.store.list_by_actor(actor)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::store::memory::MemoryStore;

    struct BrokenLog;

    #[async_trait]
    impl AuditStore for BrokenLog {
        async fn append(&self, _entry: NewActivity) -> Result<ActivityLog, StoreError> {
            Err(StoreError::Timeout)
        }

        async fn list_all(&self) -> Result<Vec<ActivityLog>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_by_actor(&self, _actor: PrincipalId) -> Result<Vec<ActivityLog>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_record_and_filter_by_actor() {
        let store = MemoryStore::new();
        let sink = AuditSink::new(Arc::new(store), clock(), Duration::from_secs(1));
        let alice = PrincipalId::new(1);
        let bob = PrincipalId::new(2);

        sink.record(Some(alice), AuditAction::StockRestocked, "Restocked 5 units")
            .await;
        sink.record(Some(bob), AuditAction::AdminCreated, "Created admin")
            .await;

        assert_eq!(sink.list_all().await.unwrap().len(), 2);

        let mine = sink.list_by_actor(alice).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].action, "STOCK_RESTOCKED");
        assert_eq!(mine[0].details, "Restocked 5 units");
    }

    #[tokio::test]
    async fn test_failed_append_is_swallowed() {
        let sink = AuditSink::new(Arc::new(BrokenLog), clock(), Duration::from_secs(1));
        sink.record(None, AuditAction::OrderStatusUpdated, "ignored")
            .await;
        assert!(sink.list_all().await.unwrap().is_empty());
    }
}
