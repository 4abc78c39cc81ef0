//! Activity log repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shopfront_core::{ActivityLogId, PrincipalId};

use crate::models::{ActivityLog, NewActivity};
use crate::store::{AuditStore, StoreError};

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: ActivityLogId,
    actor_id: Option<PrincipalId>,
    action: String,
    details: String,
    recorded_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityLog {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action,
            details: row.details,
            recorded_at: row.recorded_at,
        }
    }
}

/// Repository for `shop.activity_log`. Rows are never updated or deleted.
#[derive(Debug, Clone)]
pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    /// Create a new activity log repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgActivityLog {
    async fn append(&self, entry: NewActivity) -> Result<ActivityLog, StoreError> {
        let row = sqlx::query_as::<_, ActivityRow>(
            r"
            INSERT INTO shop.activity_log (actor_id, action, details, recorded_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, actor_id, action, details, recorded_at
            ",
        )
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(&entry.details)
        .bind(entry.recorded_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_all(&self) -> Result<Vec<ActivityLog>, StoreError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r"
            SELECT id, actor_id, action, details, recorded_at
            FROM shop.activity_log
            ORDER BY recorded_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ActivityLog::from).collect())
    }

    async fn list_by_actor(&self, actor: PrincipalId) -> Result<Vec<ActivityLog>, StoreError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r"
            SELECT id, actor_id, action, details, recorded_at
            FROM shop.activity_log
            WHERE actor_id = $1
            ORDER BY recorded_at DESC, id DESC
            ",
        )
        .bind(actor)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ActivityLog::from).collect())
    }
}
