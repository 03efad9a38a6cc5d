use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, NewPrincipal, Principal};
use crate::error::StoreError;

const PRINCIPAL_COLUMNS: &str =
    "id, name, email, password_hash, refresh_token, created_at, updated_at";

/// PostgreSQL-backed credential store (`auth_users` table).
///
/// Email uniqueness is enforced by a unique index; the refresh slot
/// compare-and-swap is a single conditional `UPDATE`.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Principal {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PgCredentialStore {
    async fn fetch_one_where(
        &self,
        condition: &str,
        value: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let query = format!("SELECT {} FROM auth_users WHERE {} = $1", PRINCIPAL_COLUMNS, condition);
        let row = sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Principal::from))
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO auth_users (id, name, email, password_hash, refresh_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL, $5, $5)
            RETURNING {}
            "#,
            PRINCIPAL_COLUMNS
        );
        let row = sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(Uuid::new_v4())
            .bind(&principal.name)
            .bind(&principal.email)
            .bind(&principal.password_hash)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        let query = format!("SELECT {} FROM auth_users WHERE id = $1", PRINCIPAL_COLUMNS);
        let row = sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Principal::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        self.fetch_one_where("email", email).await
    }

    async fn find_by_refresh_token(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Principal>, StoreError> {
        self.fetch_one_where("refresh_token", fingerprint).await
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        fingerprint: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE auth_users SET refresh_token = $1, updated_at = $2 WHERE id = $3")
            .bind(fingerprint)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auth_users
            SET refresh_token = $1, updated_at = $2
            WHERE id = $3 AND refresh_token = $4
            "#,
        )
        .bind(next)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE auth_users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let query = format!(
            r#"
            UPDATE auth_users
            SET name = $1, email = $2, updated_at = $3
            WHERE id = $4
            RETURNING {}
            "#,
            PRINCIPAL_COLUMNS
        );
        let row = sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(name)
            .bind(email)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Principal::from))
    }

    async fn list(&self, logged_in_only: bool) -> Result<Vec<Principal>, StoreError> {
        let filter = if logged_in_only {
            "WHERE refresh_token IS NOT NULL"
        } else {
            ""
        };
        let query = format!(
            "SELECT {} FROM auth_users {} ORDER BY created_at DESC",
            PRINCIPAL_COLUMNS, filter
        );
        let rows = sqlx::query_as::<_, PrincipalRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Principal::from).collect())
    }
}
