//! Admin login, admin bootstrap and account management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use shopfront_core::{PrincipalId, Role};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::Principal;
use crate::routes::users::{AuthResponse, LoginRequest, RegisterRequest};
use crate::state::AppState;

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (principal, token) = state
        .credentials()
        .admin_login(&body.email, &body.password)
        .await?;

    add_breadcrumb("auth", "Admin logged in", None);
    Ok(Json(AuthResponse::new(principal, token)))
}

/// Whether any admin account exists. Public, used by the setup screen.
///
/// GET /api/admin/exists
pub async fn exists(State(state): State<AppState>) -> Result<Json<bool>> {
    Ok(Json(state.credentials().any_admin_exists().await?))
}

/// Create the first admin. Refused with 403 once any admin exists.
///
/// POST /api/admin/register-first
pub async fn register_first(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Principal>)> {
    let admin = state
        .credentials()
        .register_first_admin(&body.name, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(admin)))
}

/// POST /api/admin/register
pub async fn register(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Principal>)> {
    let admin = state
        .credentials()
        .register_admin(&actor, &body.name, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(admin)))
}

/// GET /api/admin/profile
pub async fn profile(RequireAdmin(admin): RequireAdmin) -> Json<Principal> {
    Json(admin)
}

/// GET /api/admin/list
pub async fn list_admins(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Principal>>> {
    Ok(Json(state.credentials().list(Some(Role::Admin)).await?))
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub role: Option<Role>,
}

/// GET /api/admin/users?role=
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<Principal>>> {
    Ok(Json(state.credentials().list(query.role).await?))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<Json<Principal>> {
    state
        .credentials()
        .get(PrincipalId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Delete an account. Its session goes with it.
///
/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    if state
        .credentials()
        .delete(&actor, PrincipalId::new(id))
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("User not found".to_string()))
    }
}
