//! Activity log (audit trail) types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{ActivityLogId, PrincipalId};

/// Kinds of admin-facing mutations that are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    /// An order moved to a new status.
    OrderStatusUpdated,
    /// An admin account was created.
    AdminCreated,
    /// Units were added to a product.
    StockRestocked,
    /// An account was deleted by an admin.
    PrincipalDeleted,
}

impl AuditAction {
    /// Stable name stored in the log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderStatusUpdated => "ORDER_STATUS_UPDATED",
            Self::AdminCreated => "ADMIN_CREATED",
            Self::StockRestocked => "STOCK_RESTOCKED",
            Self::PrincipalDeleted => "PRINCIPAL_DELETED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: ActivityLogId,
    /// Acting principal. `None` once that account has been deleted.
    pub actor_id: Option<PrincipalId>,
    pub action: String,
    pub details: String,
    pub recorded_at: DateTime<Utc>,
}

/// Data for appending an activity.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub actor_id: Option<PrincipalId>,
    pub action: AuditAction,
    pub details: String,
    pub recorded_at: DateTime<Utc>,
}
