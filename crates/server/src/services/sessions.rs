//! Session token manager.
//!
//! Bearer tokens are 32 random bytes encoded as unpadded base64url (43
//! characters, 256 bits of entropy). A principal holds at most one token:
//! issuing a new one replaces the old row in the same storage call.
//!
//! Expired tokens are never deleted on read. They stop resolving at
//! `expires_at` and are removed by [`SessionTokenManager::sweep_expired`],
//! which the background sweeper calls on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::models::session::log_prefix;
use crate::models::{Principal, SessionToken};
use crate::services::ServiceSettings;
use crate::store::{PrincipalStore, StoreError, TokenStore, bounded};

const TOKEN_BYTES: usize = 32;

/// Length of an encoded token value.
pub const TOKEN_LENGTH: usize = 43;

/// Generate a fresh bearer value.
#[must_use]
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `value` could have been produced by [`generate_token_value`].
#[must_use]
pub fn is_well_formed(value: &str) -> bool {
    value.len() == TOKEN_LENGTH
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Issues, resolves, refreshes and expires session tokens.
pub struct SessionTokenManager {
    tokens: Arc<dyn TokenStore>,
    principals: Arc<dyn PrincipalStore>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    timeout: Duration,
}

impl SessionTokenManager {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        principals: Arc<dyn PrincipalStore>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            tokens,
            principals,
            clock,
            ttl: settings.session_ttl,
            timeout: settings.storage_timeout,
        }
    }

    /// Lifetime given to issued and refreshed tokens.
    #[must_use]
    pub const fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Issue a new token for `principal`, invalidating any token it held.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the token could not be stored.
    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn issue(&self, principal: &Principal) -> Result<SessionToken, StoreError> {
        let now = self.clock.now();
        let token = SessionToken {
            value: generate_token_value(),
            principal_id: principal.id,
            created_at: now,
            expires_at: now + self.ttl,
        };

        bounded(self.timeout, self.tokens.replace_for_principal(&token)).await?;

        info!(
            token = token.log_prefix(),
            expires_at = %token.expires_at,
            "Issued session token"
        );
        Ok(token)
    }

    /// Resolve a bearer value to its principal.
    ///
    /// Unknown, expired and malformed values all resolve to `None`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only if storage fails.
    pub async fn resolve(&self, value: &str) -> Result<Option<Principal>, StoreError> {
        if !is_well_formed(value) {
            return Ok(None);
        }

        let Some(token) = bounded(self.timeout, self.tokens.find(value)).await? else {
            return Ok(None);
        };

        if !token.is_live_at(self.clock.now()) {
            debug!(token = token.log_prefix(), "Rejected expired session token");
            return Ok(None);
        }

        bounded(self.timeout, self.principals.find_by_id(token.principal_id)).await
    }

    /// Delete a token. Missing tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if storage fails.
    pub async fn invalidate(&self, value: &str) -> Result<(), StoreError> {
        if !is_well_formed(value) {
            return Ok(());
        }

        if bounded(self.timeout, self.tokens.delete(value)).await? {
            info!(token = log_prefix(value), "Invalidated session token");
        }
        Ok(())
    }

    /// Push a live token's expiry to `now + ttl`.
    ///
    /// Returns the new expiry, or `None` when the token is missing or already
    /// expired. Expired tokens are not brought back.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if storage fails.
    pub async fn refresh(&self, value: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        if !is_well_formed(value) {
            return Ok(None);
        }

        let Some(token) = bounded(self.timeout, self.tokens.find(value)).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if !token.is_live_at(now) {
            return Ok(None);
        }

        let expires_at = now + self.ttl;
        let extended = bounded(self.timeout, self.tokens.extend(value, expires_at)).await?;

        Ok(extended.then_some(expires_at))
    }

    /// Delete every token with `expires_at < now`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if storage fails.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let removed = bounded(self.timeout, self.tokens.delete_expired(now)).await?;
        info!(removed, "Swept expired session tokens");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use shopfront_core::{Email, Role};

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::NewPrincipal;
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        clock: ManualClock,
        manager: SessionTokenManager,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap());
        let manager = SessionTokenManager::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            ServiceSettings::default(),
        );
        Fixture {
            store,
            clock,
            manager,
        }
    }

    async fn principal(fx: &Fixture, email: &str) -> Principal {
        fx.store
            .insert(NewPrincipal {
                name: "Test User".to_owned(),
                email: Email::parse(email).unwrap(),
                password_hash: "hash".to_owned(),
                role: Role::Customer,
                created_at: fx.clock.now(),
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_generated_values_are_well_formed() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(is_well_formed(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_values() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"=".repeat(TOKEN_LENGTH)));
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_token() {
        let fx = fixture();
        let user = principal(&fx, "user@example.com").await;

        let first = fx.manager.issue(&user).await.unwrap();
        let second = fx.manager.issue(&user).await.unwrap();

        assert_eq!(fx.manager.resolve(&first.value).await.unwrap(), None);
        assert_eq!(fx.manager.resolve(&second.value).await.unwrap(), Some(user));
        assert_eq!(fx.store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_token_stops_resolving_at_expiry() {
        let fx = fixture();
        let user = principal(&fx, "user@example.com").await;
        let token = fx.manager.issue(&user).await.unwrap();

        fx.clock.set(token.expires_at - chrono::Duration::seconds(1));
        assert!(fx.manager.resolve(&token.value).await.unwrap().is_some());

        fx.clock.set(token.expires_at);
        assert!(fx.manager.resolve(&token.value).await.unwrap().is_none());

        // Resolve leaves the row for the sweeper.
        assert_eq!(fx.store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_extends_live_token_only() {
        let fx = fixture();
        let user = principal(&fx, "user@example.com").await;
        let token = fx.manager.issue(&user).await.unwrap();

        fx.clock.advance(chrono::Duration::days(6));
        let extended = fx.manager.refresh(&token.value).await.unwrap().unwrap();
        assert_eq!(extended, fx.clock.now() + chrono::Duration::days(7));

        fx.clock.set(extended);
        assert_eq!(fx.manager.refresh(&token.value).await.unwrap(), None);
        assert!(fx.manager.resolve(&token.value).await.unwrap().is_none());

        assert_eq!(fx.manager.refresh("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let fx = fixture();
        let user = principal(&fx, "user@example.com").await;
        let token = fx.manager.issue(&user).await.unwrap();

        fx.manager.invalidate(&token.value).await.unwrap();
        fx.manager.invalidate(&token.value).await.unwrap();
        fx.manager.invalidate("").await.unwrap();

        assert!(fx.manager.resolve(&token.value).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let fx = fixture();
        let old = principal(&fx, "old@example.com").await;
        let old_token = fx.manager.issue(&old).await.unwrap();

        fx.clock.advance(chrono::Duration::days(3));
        let fresh = principal(&fx, "fresh@example.com").await;
        let fresh_token = fx.manager.issue(&fresh).await.unwrap();

        let sweep_at = old_token.expires_at + chrono::Duration::seconds(1);
        assert_eq!(fx.manager.sweep_expired(sweep_at).await.unwrap(), 1);

        fx.clock.set(sweep_at);
        assert!(fx.manager.resolve(&fresh_token.value).await.unwrap().is_some());
        assert_eq!(fx.store.token_count(), 1);
    }
}
