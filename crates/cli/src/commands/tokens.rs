//! Session token housekeeping.

use std::sync::Arc;

use shopfront_server::clock::{Clock, SystemClock};
use shopfront_server::services::Services;
use shopfront_server::store::{Backend, StoreError};

use super::{ConnectError, connect};

#[derive(Debug, thiserror::Error)]
pub enum TokensError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("sweep failed: {0}")]
    Store(#[from] StoreError),
}

/// Delete every token expired as of now. The server runs the same sweep on
/// a timer; this is for deployments that prefer cron.
///
/// # Errors
///
/// Returns `TokensError` if the database is unreachable or the delete fails.
pub async fn sweep() -> Result<(), TokensError> {
    let (config, pool) = connect().await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = Services::new(
        &Backend::postgres(pool),
        Arc::clone(&clock),
        config.service_settings(),
    );

    services.sessions.sweep_expired(clock.now()).await?;
    Ok(())
}
