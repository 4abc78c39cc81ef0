//! Bearer-token authentication extractors.
//!
//! The token travels in an `Authorization: Bearer <token>` header and is
//! resolved through the [`SessionTokenManager`](crate::services::SessionTokenManager).
//! A missing, malformed, expired or superseded token is a 401; a customer on
//! an admin route is a 403.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use shopfront_core::Role;

use crate::error::{AppError, set_sentry_user};
use crate::models::Principal;
use crate::state::AppState;
use crate::store::StoreError;

/// Extractor for the raw bearer token, without resolving it.
///
/// Used by logout and refresh, which must answer even for dead tokens.
pub struct BearerToken(pub Option<String>);

/// Extractor that requires a live session of any role.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(principal): RequireAuth) -> impl IntoResponse {
///     Json(UserResponse::from(&principal))
/// }
/// ```
pub struct RequireAuth(pub Principal);

/// Extractor that requires a live session belonging to an admin.
pub struct RequireAdmin(pub Principal);

/// Error returned when a route's authentication requirement is not met.
#[derive(Debug)]
pub enum AuthRejection {
    /// No usable token.
    Unauthorized,
    /// Valid token, wrong role.
    Forbidden,
    /// The token could not be checked.
    Store(StoreError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Admin access required" })),
            )
                .into_response(),
            Self::Store(err) => AppError::from(err).into_response(),
        }
    }
}

/// Pull the token out of an `Authorization` header value.
///
/// The scheme is matched case-insensitively; an empty token is treated as absent.
#[must_use]
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn bearer_from_parts(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
}

async fn resolve_principal(parts: &Parts, state: &AppState) -> Result<Principal, AuthRejection> {
    let token = bearer_from_parts(parts).ok_or(AuthRejection::Unauthorized)?;

    let principal = state
        .sessions()
        .resolve(token)
        .await
        .map_err(AuthRejection::Store)?
        .ok_or(AuthRejection::Unauthorized)?;

    set_sentry_user(&principal.id, Some(principal.email.as_str()));
    Ok(principal)
}

impl FromRequestParts<AppState> for BearerToken {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(bearer_from_parts(parts).map(String::from)))
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_principal(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = resolve_principal(parts, state).await?;
        if principal.role != Role::Admin {
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("bearer  abc123 "), Some("abc123"));
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("abc123"), None);
    }

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            AuthRejection::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthRejection::Store(StoreError::Timeout)
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
