//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;
pub mod tokens;

use sqlx::PgPool;

use shopfront_server::config::{ConfigError, ServerConfig};
use shopfront_server::db;

/// Load the server configuration and open a pool.
///
/// `ServerConfig::from_env` loads `.env` first.
pub(crate) async fn connect() -> Result<(ServerConfig, PgPool), ConnectError> {
    let config = ServerConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url, config.storage_timeout).await?;
    Ok((config, pool))
}

/// Errors from [`connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
