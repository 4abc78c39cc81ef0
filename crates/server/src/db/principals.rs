//! Principal repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use shopfront_core::{Email, PrincipalId, Role};

use super::{conflict_on_unique, email_from_db};
use crate::models::{NewPrincipal, Principal};
use crate::store::{PrincipalStore, StoreError};

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: PrincipalId,
    name: String,
    email: String,
    role: Role,
    created_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: email_from_db(&row.email)?,
            role: row.role,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    principal: PrincipalRow,
    password_hash: String,
}

/// Repository for `shop.principal`.
#[derive(Debug, Clone)]
pub struct PgPrincipals {
    pool: PgPool,
}

impl PgPrincipals {
    /// Create a new principal repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipals {
    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        sqlx::query_as::<_, PrincipalRow>(
            r"
            SELECT id, name, email, role, created_at
            FROM shop.principal
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Principal::try_from)
        .transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Principal>, StoreError> {
        sqlx::query_as::<_, PrincipalRow>(
            r"
            SELECT id, name, email, role, created_at
            FROM shop.principal
            WHERE lower(email) = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Principal::try_from)
        .transpose()
    }

    async fn find_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Principal, String)>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r"
            SELECT id, name, email, role, created_at, password_hash
            FROM shop.principal
            WHERE lower(email) = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Ok((Principal::try_from(r.principal)?, r.password_hash)))
            .transpose()
    }

    #[instrument(skip(self, principal), fields(email = %principal.email, role = %principal.role))]
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r"
            INSERT INTO shop.principal (name, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, role, created_at
            ",
        )
        .bind(&principal.name)
        .bind(principal.email.as_str())
        .bind(&principal.password_hash)
        .bind(principal.role)
        .bind(principal.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        Principal::try_from(row)
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<Principal>, StoreError> {
        sqlx::query_as::<_, PrincipalRow>(
            r"
            SELECT id, name, email, role, created_at
            FROM shop.principal
            WHERE $1::shop.role IS NULL OR role = $1
            ORDER BY id
            ",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Principal::try_from)
        .collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: PrincipalId) -> Result<bool, StoreError> {
        // session_token rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM shop.principal WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn any_admin_exists(&self) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.principal WHERE role = 'admin')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
