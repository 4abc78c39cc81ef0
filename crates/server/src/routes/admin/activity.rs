//! Audit trail routes.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::ActivityLog;
use crate::state::AppState;

/// GET /api/admin/activity-logs
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<ActivityLog>>> {
    Ok(Json(state.audit().list_all().await?))
}

/// Entries recorded by the calling admin.
///
/// GET /api/admin/activity-logs/my
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<ActivityLog>>> {
    Ok(Json(state.audit().list_by_actor(admin.id).await?))
}
