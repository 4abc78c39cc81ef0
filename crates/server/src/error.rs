//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Service errors are
//! classified into an [`ErrorKind`], which picks the HTTP status; server-side
//! failures are captured to Sentry before responding and their details are
//! never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{AuthError, LedgerError, OrderError};
use crate::store::StoreError;

/// Outcome classification shared by all service errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Unauthorized,
    Forbidden,
    /// Storage was slow or unreachable; retrying may succeed.
    Transient,
    Internal,
}

impl ErrorKind {
    /// Classify a storage failure.
    #[must_use]
    pub fn from_store(err: &StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::Conflict,
            err if err.is_transient() => Self::Transient,
            _ => Self::Internal,
        }
    }

    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Invalid => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Transient => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure is ours rather than the caller's.
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        matches!(self, Self::Transient | Self::Internal)
    }
}

impl AuthError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEmail(_) | Self::InvalidName(_) | Self::WeakPassword(_) => {
                ErrorKind::Invalid
            }
            Self::InvalidCredentials => ErrorKind::Unauthorized,
            Self::EmailTaken => ErrorKind::Conflict,
            Self::AdminsExist | Self::Forbidden => ErrorKind::Forbidden,
            Self::PasswordHash => ErrorKind::Internal,
            Self::Store(err) => ErrorKind::from_store(err),
        }
    }
}

impl LedgerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientStock { .. } => ErrorKind::Conflict,
            Self::UnknownProduct(_) => ErrorKind::NotFound,
            Self::InvalidQuantity => ErrorKind::Invalid,
            Self::Store(err) => ErrorKind::from_store(err),
        }
    }
}

/// Application-level error type for the HTTP surface.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Authentication or account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Stock operation failed.
    #[error("Inventory error: {0}")]
    Ledger(#[from] LedgerError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(err) => ErrorKind::from_store(err),
            Self::Auth(err) => err.kind(),
            Self::Ledger(err) => err.kind(),
            Self::Order(err) => err.kind(),
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::BadRequest(_) => ErrorKind::Invalid,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => return "Internal server error".to_string(),
            ErrorKind::Transient => return "Service temporarily unavailable".to_string(),
            _ => {}
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::EmailTaken => "An account with this email already exists".to_string(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::InvalidName(msg) | AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::AdminsExist => "An admin account already exists".to_string(),
                AuthError::Forbidden => "Admin access required".to_string(),
                AuthError::PasswordHash | AuthError::Store(_) => "Authentication error".to_string(),
            },
            Self::Ledger(err) => err.to_string(),
            Self::Order(err) => err.to_string(),
            Self::Store(_) => "Conflicting update".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        // Capture server errors to Sentry
        if kind.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(json!({ "error": self.public_message() }));
        (kind.status(), body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after a bearer token resolves.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("orders", "Order submitted", Some(&[("tracking_id", "TRK...")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
