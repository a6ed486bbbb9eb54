use inkpost_core::{models::User, AppError};
use sqlx::{PgPool, Postgres};

use super::category::map_conflict;

const USER_COLUMNS: &str = "id, username, password_hash, email, nickname, bio, avatar_url, role, status, created_at, updated_at";

/// Repository for blog users (authors and administrators)
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "count"))]
    pub async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, password_hash), fields(db.table = "users", db.operation = "insert"))]
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        nickname: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let result = sqlx::query_as::<Postgres, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, nickname, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(nickname)
        .bind(role)
        .fetch_one(&self.pool)
        .await;

        map_conflict(result.map_err(AppError::from), "Username or email already exists")
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Look up by username or email.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn find_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $1 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Overwrite the profile columns (nickname, bio, avatar).
    #[tracing::instrument(skip(self, user), fields(db.table = "users", db.operation = "update", db.record_id = %user.id))]
    pub async fn save_profile(&self, user: &User) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            r#"
            UPDATE users SET nickname = $2, bio = $3, avatar_url = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.nickname)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
