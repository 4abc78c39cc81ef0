//! Session token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use shopfront_core::PrincipalId;

use crate::models::SessionToken;
use crate::store::{StoreError, TokenStore};

#[derive(sqlx::FromRow)]
struct TokenRow {
    token: String,
    principal_id: PrincipalId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<TokenRow> for SessionToken {
    fn from(row: TokenRow) -> Self {
        Self {
            value: row.token,
            principal_id: row.principal_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// Repository for `shop.session_token`.
#[derive(Debug, Clone)]
pub struct PgTokens {
    pool: PgPool,
}

impl PgTokens {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokens {
    #[instrument(skip(self, token), fields(principal_id = %token.principal_id))]
    async fn replace_for_principal(&self, token: &SessionToken) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the principal serializes concurrent issues for it.
        sqlx::query("SELECT id FROM shop.principal WHERE id = $1 FOR UPDATE")
            .bind(token.principal_id)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM shop.session_token WHERE principal_id = $1")
            .bind(token.principal_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            INSERT INTO shop.session_token (token, principal_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&token.value)
        .bind(token.principal_id)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, value: &str) -> Result<Option<SessionToken>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r"
            SELECT token, principal_id, created_at, expires_at
            FROM shop.session_token
            WHERE token = $1
            ",
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SessionToken::from))
    }

    async fn delete(&self, value: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM shop.session_token WHERE token = $1")
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn extend(&self, value: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE shop.session_token SET expires_at = $2 WHERE token = $1")
            .bind(value)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM shop.session_token WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
