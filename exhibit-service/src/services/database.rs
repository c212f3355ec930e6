//! PostgreSQL identity and exhibit store.
//!
//! Every call is bounded by the configured statement timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::future::Future;
use std::time::Duration;

use crate::models::{
    Exhibit, ExhibitQuery, ExhibitStatus, ExhibitType, NewExhibit, NewUser, Role, User,
    BOOTSTRAP_ADMIN_ID,
};
use crate::services::error::StoreError;
use crate::services::store::{ExhibitStore, IdentityStore};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, profile_photo_path, role_id, created_at, updated_at";

const EXHIBIT_SELECT: &str = r#"
    SELECT e.id, e.title, e.type_id, t.name AS type_name, e.description, e.asset_path,
           e.author_id, u.username AS author_username, e.status_id, e.created_at, e.updated_at
    FROM exhibits e
    LEFT JOIN exhibit_types t ON t.id = e.type_id
    LEFT JOIN users u ON u.id = e.author_id
"#;

#[derive(FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    password_hash: String,
    profile_photo_path: String,
    role_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_id(row.role_id)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role id {}", row.role_id)))?;
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            profile_photo_path: row.profile_photo_path,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ExhibitRow {
    id: i32,
    title: String,
    type_id: i32,
    type_name: Option<String>,
    description: String,
    asset_path: String,
    author_id: i32,
    author_username: Option<String>,
    status_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExhibitRow> for Exhibit {
    type Error = StoreError;

    fn try_from(row: ExhibitRow) -> Result<Self, Self::Error> {
        let status = ExhibitStatus::from_id(row.status_id)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status id {}", row.status_id)))?;
        Ok(Exhibit {
            id: row.id,
            title: row.title,
            type_id: row.type_id,
            type_name: row.type_name,
            description: row.description,
            asset_path: row.asset_path,
            author_id: row.author_id,
            author_username: row.author_username,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Escape LIKE wildcards so a username filter is a literal substring.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    timeout: Duration,
}

impl Database {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                tracing::error!(timeout_ms = self.timeout.as_millis() as u64, "Database call timed out");
                Err(StoreError::Timeout)
            }
        }
    }

    async fn fetch_user(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(value)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, profile_photo_path, role_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(&user.profile_photo_path)
                    .bind(user.role.id())
                    .fetch_one(&self.pool),
            )
            .await?;
        User::try_from(row)
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = self
            .timed(
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("username", username).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_user("email", email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let rows = self
            .timed(sqlx::query_as::<_, UserRow>(&sql).fetch_all(&self.pool))
            .await?;
        convert_all(rows)
    }

    async fn update_role(&self, id: i32, role: Role) -> Result<bool, StoreError> {
        let result = self
            .timed(
                sqlx::query("UPDATE users SET role_id = $2, updated_at = NOW() WHERE id = $1")
                    .bind(id)
                    .bind(role.id())
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_profile_photo(&self, id: i32, path: &str) -> Result<bool, StoreError> {
        let result = self
            .timed(
                sqlx::query(
                    "UPDATE users SET profile_photo_path = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .bind(path)
                .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: i32) -> Result<bool, StoreError> {
        let result = self
            .timed(
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_bootstrap_admin(&self, user: NewUser) -> Result<bool, StoreError> {
        let result = self
            .timed(
                sqlx::query(
                    "INSERT INTO users (id, username, email, password_hash, profile_photo_path, role_id) \
                     VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
                )
                .bind(BOOTSTRAP_ADMIN_ID)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(&user.profile_photo_path)
                .bind(Role::Admin.id())
                .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.timed(sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ExhibitStore for Database {
    async fn insert_exhibit(&self, exhibit: NewExhibit) -> Result<Exhibit, StoreError> {
        let sql = format!(
            "WITH e AS (\
                INSERT INTO exhibits (title, type_id, description, asset_path, author_id, status_id) \
                VALUES ($1, $2, $3, $4, $5, $6) RETURNING *\
             ) {}",
            EXHIBIT_SELECT.replace("FROM exhibits e", "FROM e")
        );
        let row = self
            .timed(
                sqlx::query_as::<_, ExhibitRow>(&sql)
                    .bind(&exhibit.title)
                    .bind(exhibit.type_id)
                    .bind(&exhibit.description)
                    .bind(&exhibit.asset_path)
                    .bind(exhibit.author_id)
                    .bind(exhibit.status.id())
                    .fetch_one(&self.pool),
            )
            .await?;
        Exhibit::try_from(row)
    }

    async fn find_exhibit(&self, id: i32) -> Result<Option<Exhibit>, StoreError> {
        let sql = format!("{} WHERE e.id = $1", EXHIBIT_SELECT);
        let row = self
            .timed(
                sqlx::query_as::<_, ExhibitRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Exhibit::try_from).transpose()
    }

    async fn list_exhibits(&self, query: &ExhibitQuery) -> Result<Vec<Exhibit>, StoreError> {
        let sql = format!(
            "{} WHERE ($1::INT IS NULL OR e.status_id = $1) \
               AND ($2::TEXT IS NULL OR u.username ILIKE $2) \
               AND ($3::TIMESTAMPTZ IS NULL OR e.created_at >= $3) \
               AND ($4::TIMESTAMPTZ IS NULL OR e.created_at < $4) \
             ORDER BY e.created_at DESC, e.id DESC",
            EXHIBIT_SELECT
        );
        let rows = self
            .timed(
                sqlx::query_as::<_, ExhibitRow>(&sql)
                    .bind(query.status.map(|s| s.id()))
                    .bind(query.username.as_deref().map(like_pattern))
                    .bind(query.created_from)
                    .bind(query.created_before)
                    .fetch_all(&self.pool),
            )
            .await?;
        convert_all(rows)
    }

    async fn list_exhibits_by_author(&self, author_id: i32) -> Result<Vec<Exhibit>, StoreError> {
        let sql = format!(
            "{} WHERE e.author_id = $1 ORDER BY e.created_at DESC, e.id DESC",
            EXHIBIT_SELECT
        );
        let rows = self
            .timed(
                sqlx::query_as::<_, ExhibitRow>(&sql)
                    .bind(author_id)
                    .fetch_all(&self.pool),
            )
            .await?;
        convert_all(rows)
    }

    async fn transition_status(
        &self,
        id: i32,
        from: ExhibitStatus,
        to: ExhibitStatus,
    ) -> Result<bool, StoreError> {
        let result = self
            .timed(
                sqlx::query(
                    "UPDATE exhibits SET status_id = $3, updated_at = NOW() \
                     WHERE id = $1 AND status_id = $2",
                )
                .bind(id)
                .bind(from.id())
                .bind(to.id())
                .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_exhibit(&self, id: i32) -> Result<bool, StoreError> {
        let result = self
            .timed(
                sqlx::query("DELETE FROM exhibits WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_exhibit_types(&self) -> Result<Vec<ExhibitType>, StoreError> {
        self.timed(
            sqlx::query_as::<_, ExhibitType>("SELECT id, name FROM exhibit_types ORDER BY id")
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn find_exhibit_type(&self, id: i32) -> Result<Option<ExhibitType>, StoreError> {
        self.timed(
            sqlx::query_as::<_, ExhibitType>("SELECT id, name FROM exhibit_types WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }
}
