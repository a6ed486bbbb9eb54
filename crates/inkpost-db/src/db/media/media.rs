use inkpost_core::{
    models::{Media, NewMedia},
    AppError,
};
use sqlx::{PgPool, Postgres};

const MEDIA_COLUMNS: &str =
    "id, file_name, file_path, file_hash, mime_type, size, created_at, updated_at";

/// Repository for the media library. Rows are authoritative; files on disk
/// are cleaned up after the row is gone.
#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, media), fields(db.table = "media", db.operation = "insert", file_path = %media.file_path))]
    pub async fn create(&self, media: &NewMedia) -> Result<Media, AppError> {
        let created = sqlx::query_as::<Postgres, Media>(&format!(
            r#"
            INSERT INTO media (file_name, file_path, file_hash, mime_type, size)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(&media.file_name)
        .bind(&media.file_path)
        .bind(&media.file_hash)
        .bind(&media.mime_type)
        .bind(media.size)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>(&format!(
            "SELECT {} FROM media WHERE id = $1",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    /// Existing upload with the same content digest, if any.
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    pub async fn find_by_hash(&self, file_hash: &str) -> Result<Option<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>(&format!(
            "SELECT {} FROM media WHERE file_hash = $1 ORDER BY id ASC LIMIT 1",
            MEDIA_COLUMNS
        ))
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    /// Newest first, offset paginated. Returns the page and the total row count.
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Media>, i64), AppError> {
        let rows = sqlx::query_as::<Postgres, Media>(&format!(
            "SELECT {} FROM media ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            MEDIA_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM media")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Delete the row and hand back what was deleted so the caller can
    /// schedule file removal.
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<Option<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>(&format!(
            "DELETE FROM media WHERE id = $1 RETURNING {}",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    /// True if another row still points at `file_path` (dedup shares files).
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    pub async fn is_file_referenced(&self, file_path: &str) -> Result<bool, AppError> {
        let referenced = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM media WHERE file_path = $1)",
        )
        .bind(file_path)
        .fetch_one(&self.pool)
        .await?;

        Ok(referenced)
    }

    /// Every file path referenced by a media row.
    #[tracing::instrument(skip(self), fields(db.table = "media", db.operation = "select"))]
    pub async fn list_all_referenced_file_paths(&self) -> Result<Vec<String>, AppError> {
        let paths = sqlx::query_scalar::<Postgres, String>("SELECT DISTINCT file_path FROM media")
            .fetch_all(&self.pool)
            .await?;

        Ok(paths)
    }
}
