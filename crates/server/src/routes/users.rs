//! Customer account and session routes.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopfront_core::{Email, PrincipalId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{BearerToken, RequireAuth};
use crate::models::{Principal, SessionToken};
use crate::state::AppState;

/// Body returned by every endpoint that opens a session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: PrincipalId,
    pub name: String,
    pub email: Email,
    pub is_admin: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthResponse {
    pub(crate) fn new(principal: Principal, token: SessionToken) -> Self {
        Self {
            user_id: principal.id,
            is_admin: principal.is_admin(),
            name: principal.name,
            email: principal.email,
            token: token.value,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Register a customer account and log it in.
///
/// POST /api/users/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response> {
    let (principal, token) = state
        .credentials()
        .register_customer(&body.name, &body.email, &body.password)
        .await?;

    add_breadcrumb("auth", "Customer registered", None);
    Ok((StatusCode::CREATED, Json(AuthResponse::new(principal, token))).into_response())
}

/// Log in with email and password.
///
/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (principal, token) = state
        .credentials()
        .login(&body.email, &body.password)
        .await?;

    add_breadcrumb("auth", "Customer logged in", None);
    Ok(Json(AuthResponse::new(principal, token)))
}

/// The principal behind the bearer token.
///
/// GET /api/users/me, GET /api/users/profile
pub async fn me(RequireAuth(principal): RequireAuth) -> Json<Principal> {
    Json(principal)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// New expiry; `None` when the token was missing or already dead.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Push the token's expiry out by one session lifetime.
///
/// POST /api/auth-tokens/refresh
pub async fn refresh(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<RefreshResponse>> {
    let expires_at = match token {
        Some(token) => state.sessions().refresh(&token).await?,
        None => None,
    };
    Ok(Json(RefreshResponse { expires_at }))
}

/// End the session. Succeeds for unknown tokens too.
///
/// POST /api/auth-tokens/logout
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode> {
    if let Some(token) = token {
        state.sessions().invalidate(&token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
