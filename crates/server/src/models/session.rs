//! Session token domain type.

use chrono::{DateTime, Utc};

use shopfront_core::PrincipalId;

/// Number of characters of a token value that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

/// An opaque bearer credential bound to one principal.
///
/// Implements `Debug` manually so the full value never reaches a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// The bearer value (base64url, no padding).
    pub value: String,
    /// Principal the token authenticates. Never changes after issuance.
    pub principal_id: PrincipalId,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
    /// First instant at which the token no longer resolves.
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// A token is live strictly before its expiry.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Loggable prefix of the token value.
    #[must_use]
    pub fn log_prefix(&self) -> &str {
        log_prefix(&self.value)
    }
}

/// Loggable prefix of an arbitrary bearer value.
#[must_use]
pub fn log_prefix(value: &str) -> &str {
    value
        .char_indices()
        .nth(LOG_PREFIX_LEN)
        .map_or(value, |(end, _)| value.get(..end).unwrap_or_default())
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &format_args!("{}...", self.log_prefix()))
            .field("principal_id", &self.principal_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn token(expires_at: DateTime<Utc>) -> SessionToken {
        SessionToken {
            value: "abcdefghijklmnopqrstuvwxyz".to_owned(),
            principal_id: PrincipalId::new(1),
            created_at: expires_at - Duration::days(7),
            expires_at,
        }
    }

    #[test]
    fn test_live_strictly_before_expiry() {
        let expiry = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let token = token(expiry);
        assert!(token.is_live_at(expiry - Duration::seconds(1)));
        assert!(!token.is_live_at(expiry));
        assert!(!token.is_live_at(expiry + Duration::seconds(1)));
    }

    #[test]
    fn test_debug_does_not_leak_value() {
        let token = token(Utc::now());
        let debug = format!("{token:?}");
        assert!(debug.contains("abcdefgh..."));
        assert!(!debug.contains("abcdefghijklmnop"));
    }

    #[test]
    fn test_log_prefix_short_value() {
        assert_eq!(log_prefix("abc"), "abc");
        assert_eq!(log_prefix(""), "");
    }
}
