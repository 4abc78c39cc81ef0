//! Principal (account) domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfront_core::{Email, PrincipalId, Role};

/// An authenticated identity: a shopper or a store admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Unique principal ID.
    pub id: PrincipalId,
    /// Display name.
    pub name: String,
    /// Login email, normalized to lowercase.
    pub email: Email,
    /// Authorization role.
    pub role: Role,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Returns `true` if this principal is an admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Data for inserting a principal.
///
/// Implements `Debug` manually to redact the password hash.
#[derive(Clone)]
pub struct NewPrincipal {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for NewPrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPrincipal")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}
