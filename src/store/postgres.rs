use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, StoreError, UserStore};
use crate::models::token::PersonalAccessToken;
use crate::models::user::User;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Translate unique violations into `Conflict` naming the offending column.
fn map_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict {
                field: conflict_field(db.constraint()),
            };
        }
    }
    StoreError::Unavailable(e.to_string())
}

fn conflict_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("personal_access_tokens_name_key") => "name",
        Some("personal_access_tokens_public_identifier_key") => "public_identifier",
        Some("personal_access_tokens_single_bootstrap") => "bootstrap",
        Some("personal_access_tokens_pkey") | Some("users_pkey") => "id",
        Some("users_email_lower_key") => "email",
        Some("users_google_id_key") => "google_id",
        _ => "unknown",
    }
}

// -- Personal Access Token Operations --

const PAT_COLUMNS: &str = "id, name, public_identifier, secret_hash, scope, expires_at, \
                           created_by, created_at, last_used_at, revoked";

#[async_trait]
impl CredentialStore for PgStore {
    async fn insert(&self, pat: &PersonalAccessToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO personal_access_tokens
                   (id, name, public_identifier, secret_hash, scope, expires_at, created_by, created_at, last_used_at, revoked)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(pat.id)
        .bind(&pat.name)
        .bind(&pat.public_identifier)
        .bind(&pat.secret_hash)
        .bind(pat.scope.as_str())
        .bind(pat.expires_at)
        .bind(pat.created_by.to_string())
        .bind(pat.created_at)
        .bind(pat.last_used_at)
        .bind(pat.revoked)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_by_public_identifier(
        &self,
        public_identifier: &str,
    ) -> Result<Option<PersonalAccessToken>, StoreError> {
        let row = sqlx::query_as::<_, PatRow>(&format!(
            "SELECT {} FROM personal_access_tokens WHERE public_identifier = $1",
            PAT_COLUMNS
        ))
        .bind(public_identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.map(PersonalAccessToken::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonalAccessToken>, StoreError> {
        let row = sqlx::query_as::<_, PatRow>(&format!(
            "SELECT {} FROM personal_access_tokens WHERE id = $1",
            PAT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.map(PersonalAccessToken::try_from).transpose()
    }

    async fn exists_bootstrap(&self) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM personal_access_tokens WHERE created_by = 'SYSTEM')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE personal_access_tokens SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE personal_access_tokens SET revoked = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_secret(
        &self,
        id: Uuid,
        public_identifier: &str,
        secret_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"UPDATE personal_access_tokens
               SET public_identifier = $2, secret_hash = $3, last_used_at = NULL
               WHERE id = $1 AND revoked = false"#,
        )
        .bind(id)
        .bind(public_identifier)
        .bind(secret_hash)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PersonalAccessToken>, StoreError> {
        let rows = sqlx::query_as::<_, PatRow>(&format!(
            "SELECT {} FROM personal_access_tokens ORDER BY created_at DESC",
            PAT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        rows.into_iter().map(PersonalAccessToken::try_from).collect()
    }
}

// -- User Operations --

const USER_COLUMNS: &str = "id, email, name, google_id, role, active, created_at, last_login_at";

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE google_id = $1",
            USER_COLUMNS
        ))
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO users (id, email, name, google_id, role, active, created_at, last_login_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.google_id)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"UPDATE users
               SET email = $2, name = $3, google_id = $4, role = $5, active = $6, last_login_at = $7
               WHERE id = $1"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.google_id)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// -- Rows --

#[derive(Debug, sqlx::FromRow)]
pub struct PatRow {
    pub id: Uuid,
    pub name: String,
    pub public_identifier: String,
    pub secret_hash: String,
    pub scope: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl TryFrom<PatRow> for PersonalAccessToken {
    type Error = StoreError;

    fn try_from(row: PatRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            public_identifier: row.public_identifier,
            secret_hash: row.secret_hash,
            scope: row.scope.parse().map_err(corrupt)?,
            expires_at: row.expires_at,
            created_by: row.created_by.parse().map_err(corrupt)?,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked: row.revoked,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub google_id: Option<String>,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: row.email,
            name: row.name,
            google_id: row.google_id,
            role: row.role.parse().map_err(corrupt)?,
            active: row.active,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

fn corrupt(msg: String) -> StoreError {
    StoreError::Unavailable(format!("corrupt row: {}", msg))
}
