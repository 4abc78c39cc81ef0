//! Admin account bootstrap.
//!
//! # Usage
//!
//! ```bash
//! # First admin of a fresh install
//! shop-cli admin create -e admin@example.com -n "Admin Name" -p 's3cret!'
//!
//! # Another admin, when admins already exist
//! shop-cli admin create -e ops@example.com -n "Ops" -p 's3cret!' --force
//! ```

use std::sync::Arc;

use thiserror::Error;

use shopfront_server::clock::SystemClock;
use shopfront_server::services::{AuthError, Services};
use shopfront_server::store::Backend;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// An admin exists and `--force` was not given.
    #[error("An admin account already exists. Re-run with --force to add another.")]
    AdminsExist,

    #[error("{0}")]
    Auth(AuthError),
}

impl From<AuthError> for AdminError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AdminsExist => Self::AdminsExist,
            other => Self::Auth(other),
        }
    }
}

/// Create an admin account.
///
/// Without `force` this is the first-admin bootstrap and refuses to run once
/// any admin exists.
///
/// # Returns
///
/// The ID of the created admin.
///
/// # Errors
///
/// Returns `AdminError` for invalid input, an existing admin (without
/// `force`) or a database failure.
pub async fn create(
    email: &str,
    name: &str,
    password: &str,
    force: bool,
) -> Result<i32, AdminError> {
    let (config, pool) = connect().await?;
    let services = Services::new(
        &Backend::postgres(pool),
        Arc::new(SystemClock),
        config.service_settings(),
    );

    tracing::info!("Creating admin account: {email}");
    let admin = if force {
        services
            .credentials
            .create_admin_from_console(name, email, password)
            .await?
    } else {
        services
            .credentials
            .register_first_admin(name, email, password)
            .await?
    };

    tracing::info!(
        "Admin created successfully! ID: {}, Email: {}",
        admin.id,
        admin.email
    );
    Ok(admin.id.as_i32())
}
