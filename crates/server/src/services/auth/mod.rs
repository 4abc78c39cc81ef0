//! Credential store.
//!
//! Password authentication and account management. Hashes are Argon2id
//! PHC strings and never leave this module or the principal repository.
//!
//! Every successful registration or login ends in
//! [`SessionTokenManager::issue`], which replaces whatever session the
//! principal had before.

mod error;

pub use error::AuthError;

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{info, instrument};

use shopfront_core::{Email, PrincipalId, Role};

use crate::clock::Clock;
use crate::models::{AuditAction, NewPrincipal, Principal, SessionToken};
use crate::services::audit::AuditSink;
use crate::services::sessions::SessionTokenManager;
use crate::store::{PrincipalStore, StoreError, bounded};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Display name bounds, in characters.
const MIN_NAME_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 100;

/// Account registration, login and admin bootstrap.
pub struct CredentialStore {
    principals: Arc<dyn PrincipalStore>,
    sessions: Arc<SessionTokenManager>,
    audit: Arc<AuditSink>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl CredentialStore {
    #[must_use]
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        sessions: Arc<SessionTokenManager>,
        audit: Arc<AuditSink>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            principals,
            sessions,
            audit,
            clock,
            timeout,
        }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Register a customer and open a session for them.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `InvalidName` or `WeakPassword` for bad input.
    /// Returns `AuthError::EmailTaken` if the email is already registered.
    #[instrument(skip(self, name, password))]
    pub async fn register_customer(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(Principal, SessionToken), AuthError> {
        let principal = self.create(name, email, password, Role::Customer).await?;
        let token = self.sessions.issue(&principal).await?;
        Ok((principal, token))
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the password is wrong.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Principal, SessionToken), AuthError> {
        let principal = self.verify(email, password).await?;
        let token = self.sessions.issue(&principal).await?;
        Ok((principal, token))
    }

    /// Log in, accepting admin principals only.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for customers as well as for bad credentials.
    pub async fn admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Principal, SessionToken), AuthError> {
        let principal = self.verify(email, password).await?;
        if !principal.is_admin() {
            return Err(AuthError::InvalidCredentials);
        }
        let token = self.sessions.issue(&principal).await?;
        Ok((principal, token))
    }

    // =========================================================================
    // Admins
    // =========================================================================

    /// Whether at least one admin exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if storage fails.
    pub async fn any_admin_exists(&self) -> Result<bool, AuthError> {
        Ok(bounded(self.timeout, self.principals.any_admin_exists()).await?)
    }

    /// Create the first admin of an empty installation.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AdminsExist` once any admin exists.
    #[instrument(skip(self, name, password))]
    pub async fn register_first_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        if self.any_admin_exists().await? {
            return Err(AuthError::AdminsExist);
        }

        let admin = self.create(name, email, password, Role::Admin).await?;
        self.audit
            .record(
                Some(admin.id),
                AuditAction::AdminCreated,
                format!("First admin account created: {}", admin.email),
            )
            .await;
        Ok(admin)
    }

    /// Create an admin on behalf of an existing admin.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` if `actor` is not an admin.
    #[instrument(skip(self, actor, name, password), fields(actor_id = %actor.id))]
    pub async fn register_admin(
        &self,
        actor: &Principal,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        if !actor.is_admin() {
            return Err(AuthError::Forbidden);
        }

        let admin = self.create(name, email, password, Role::Admin).await?;
        self.audit
            .record(
                Some(actor.id),
                AuditAction::AdminCreated,
                format!("Created new admin account: {}", admin.email),
            )
            .await;
        Ok(admin)
    }

    /// Create an admin from an operator console, whether or not admins exist.
    ///
    /// Used by `shop-cli admin create --force`; there is no acting principal,
    /// so the new admin is recorded as the actor.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as the other registration paths.
    #[instrument(skip(self, name, password))]
    pub async fn create_admin_from_console(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let admin = self.create(name, email, password, Role::Admin).await?;
        self.audit
            .record(
                Some(admin.id),
                AuditAction::AdminCreated,
                format!("Admin account created from the console: {}", admin.email),
            )
            .await;
        Ok(admin)
    }

    // =========================================================================
    // Account management
    // =========================================================================

    /// List principals, optionally filtered by role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if storage fails.
    pub async fn list(&self, role: Option<Role>) -> Result<Vec<Principal>, AuthError> {
        Ok(bounded(self.timeout, self.principals.list(role)).await?)
    }

    /// Get one principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if storage fails.
    pub async fn get(&self, id: PrincipalId) -> Result<Option<Principal>, AuthError> {
        Ok(bounded(self.timeout, self.principals.find_by_id(id)).await?)
    }

    /// Delete a principal and its session. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if storage fails.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete(&self, actor: &Principal, id: PrincipalId) -> Result<bool, AuthError> {
        let deleted = bounded(self.timeout, self.principals.delete(id)).await?;
        if deleted {
            info!(principal_id = %id, "Deleted principal");
            self.audit
                .record(
                    Some(actor.id),
                    AuditAction::PrincipalDeleted,
                    format!("Deleted account #{id}"),
                )
                .await;
        }
        Ok(deleted)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn create(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Principal, AuthError> {
        let email = Email::parse(email)?;
        let name = validate_name(name)?;
        validate_password(password)?;

        if bounded(self.timeout, self.principals.find_by_email(&email))
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(password)?;

        let principal = bounded(
            self.timeout,
            self.principals.insert(NewPrincipal {
                name,
                email,
                password_hash,
                role,
                created_at: self.clock.now(),
            }),
        )
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Store(other),
        })?;

        info!(principal_id = %principal.id, role = %principal.role, "Registered principal");
        Ok(principal)
    }

    async fn verify(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (principal, password_hash) =
            bounded(self.timeout, self.principals.find_with_password_hash(&email))
                .await?
                .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;
        Ok(principal)
    }
}

/// Validate and trim a display name.
fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    let length = name.chars().count();
    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
        return Err(AuthError::InvalidName(format!(
            "name must be between {MIN_NAME_LENGTH} and {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::services::ServiceSettings;
    use crate::store::memory::MemoryStore;

    fn credentials() -> (MemoryStore, CredentialStore) {
        let store = MemoryStore::new();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 2, 8, 30, 0).unwrap(),
        ));
        let settings = ServiceSettings::default();
        let sessions = Arc::new(SessionTokenManager::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::clone(&clock),
            settings,
        ));
        let audit = Arc::new(AuditSink::new(
            Arc::new(store.clone()),
            Arc::clone(&clock),
            settings.storage_timeout,
        ));
        let credentials = CredentialStore::new(
            Arc::new(store.clone()),
            sessions,
            audit,
            clock,
            settings.storage_timeout,
        );
        (store, credentials)
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("hunter23", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validation_bounds() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_name("  Al ").is_err());
        assert_eq!(validate_name("  Ada ").unwrap(), "Ada");
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (_, credentials) = credentials();
        let (registered, _) = credentials
            .register_customer("Ada Lovelace", "Ada@Example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(registered.email.as_str(), "ada@example.com");
        assert_eq!(registered.role, Role::Customer);

        let (logged_in, _) = credentials
            .login("ADA@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(logged_in.id, registered.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (_, credentials) = credentials();
        credentials
            .register_customer("Ada Lovelace", "ada@example.com", "secret1")
            .await
            .unwrap();

        let err = credentials
            .register_customer("Someone Else", "ADA@example.com", "secret2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let (_, credentials) = credentials();
        credentials
            .register_customer("Ada Lovelace", "ada@example.com", "secret1")
            .await
            .unwrap();

        assert!(matches!(
            credentials.login("nobody@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            credentials.login("ada@example.com", "wrong-one").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_admin_login_rejects_customers() {
        let (_, credentials) = credentials();
        credentials
            .register_customer("Ada Lovelace", "ada@example.com", "secret1")
            .await
            .unwrap();

        assert!(matches!(
            credentials.admin_login("ada@example.com", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_first_admin_only_once() {
        let (store, credentials) = credentials();
        assert!(!credentials.any_admin_exists().await.unwrap());

        let admin = credentials
            .register_first_admin("Root Admin", "root@example.com", "secret1")
            .await
            .unwrap();
        assert!(admin.is_admin());
        assert!(credentials.any_admin_exists().await.unwrap());

        let err = credentials
            .register_first_admin("Second Admin", "second@example.com", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AdminsExist));

        let log = crate::store::AuditStore::list_all(&store).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].actor_id, Some(admin.id));

        assert!(credentials.admin_login("root@example.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_admin_requires_admin_actor() {
        let (_, credentials) = credentials();
        let (customer, _) = credentials
            .register_customer("Ada Lovelace", "ada@example.com", "secret1")
            .await
            .unwrap();

        let err = credentials
            .register_admin(&customer, "New Admin", "new@example.com", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn test_delete_drops_session() {
        let (store, credentials) = credentials();
        let admin = credentials
            .register_first_admin("Root Admin", "root@example.com", "secret1")
            .await
            .unwrap();
        let (customer, _) = credentials
            .register_customer("Ada Lovelace", "ada@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(store.token_count(), 1);

        assert!(credentials.delete(&admin, customer.id).await.unwrap());
        assert!(!credentials.delete(&admin, customer.id).await.unwrap());
        assert_eq!(store.token_count(), 0);
        assert!(credentials.get(customer.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_console_admin_ignores_existing_admins() {
        let (_, credentials) = credentials();
        credentials
            .register_first_admin("Root Admin", "root@example.com", "secret1")
            .await
            .unwrap();

        let second = credentials
            .create_admin_from_console("Night Shift", "night@example.com", "secret1")
            .await
            .unwrap();
        assert!(second.is_admin());
        assert_eq!(credentials.list(Some(Role::Admin)).await.unwrap().len(), 2);
    }
}
