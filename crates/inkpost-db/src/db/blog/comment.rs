use inkpost_core::{
    models::{Comment, CommentStatus, NewComment},
    AppError,
};
use sqlx::{PgPool, Postgres};

const COMMENT_COLUMNS: &str =
    "id, post_id, user_id, name, email, content, ip, status, parent_id, created_at";

/// Repository for post comments
#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Approved comments of a post, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "comments", db.operation = "select"))]
    pub async fn list_approved(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<Postgres, Comment>(&format!(
            "SELECT {} FROM comments WHERE post_id = $1 AND status = $2 ORDER BY created_at ASC, id ASC",
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .bind(CommentStatus::Approved.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    #[tracing::instrument(skip(self), fields(db.table = "comments", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<Postgres, Comment>(&format!(
            "SELECT {} FROM comments WHERE id = $1",
            COMMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    #[tracing::instrument(skip(self, comment), fields(db.table = "comments", db.operation = "insert", post_id = comment.post_id))]
    pub async fn create(&self, comment: &NewComment) -> Result<Comment, AppError> {
        let created = sqlx::query_as::<Postgres, Comment>(&format!(
            r#"
            INSERT INTO comments (post_id, user_id, name, email, content, ip, status, parent_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        ))
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(&comment.name)
        .bind(&comment.email)
        .bind(&comment.content)
        .bind(&comment.ip)
        .bind(comment.status.as_str())
        .bind(comment.parent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "comments", db.operation = "update", db.record_id = %id))]
    pub async fn update_status(
        &self,
        id: i64,
        status: CommentStatus,
    ) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<Postgres, Comment>(&format!(
            "UPDATE comments SET status = $2 WHERE id = $1 RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    /// Delete a comment; replies cascade.
    #[tracing::instrument(skip(self), fields(db.table = "comments", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
