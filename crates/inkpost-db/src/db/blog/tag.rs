use inkpost_core::{
    models::{PostTagRow, Tag},
    AppError,
};
use sqlx::{PgPool, Postgres};

use super::category::map_conflict;

/// Repository for tags and post/tag links
#[derive(Clone)]
pub struct TagRepository {
    pool: PgPool,
}

impl TagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<Postgres, Tag>("SELECT id, name, slug FROM tags ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Tag>, AppError> {
        let tag = sqlx::query_as::<Postgres, Tag>("SELECT id, name, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    /// Resolve tag slugs; unknown slugs are simply absent from the result.
    #[tracing::instrument(skip(self, slugs), fields(db.table = "tags", db.operation = "select", count = slugs.len()))]
    pub async fn find_by_slugs(&self, slugs: &[String]) -> Result<Vec<Tag>, AppError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let tags = sqlx::query_as::<Postgres, Tag>(
            "SELECT id, name, slug FROM tags WHERE slug = ANY($1)",
        )
        .bind(slugs)
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    /// Tags of several posts at once, ordered by tag id.
    #[tracing::instrument(skip(self, post_ids), fields(db.table = "post_tags", db.operation = "select", count = post_ids.len()))]
    pub async fn for_posts(&self, post_ids: &[i64]) -> Result<Vec<PostTagRow>, AppError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<Postgres, PostTagRow>(
            r#"
            SELECT pt.post_id, t.id, t.name, t.slug
            FROM post_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id = ANY($1)
            ORDER BY t.id ASC
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "insert"))]
    pub async fn create(&self, name: &str, slug: &str) -> Result<Tag, AppError> {
        let result = sqlx::query_as::<Postgres, Tag>(
            "INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await;

        map_conflict(result.map_err(AppError::from), "Tag name or slug already exists")
    }

    #[tracing::instrument(skip(self, tag), fields(db.table = "tags", db.operation = "update", db.record_id = %tag.id))]
    pub async fn save(&self, tag: &Tag) -> Result<Option<Tag>, AppError> {
        let result = sqlx::query_as::<Postgres, Tag>(
            "UPDATE tags SET name = $2, slug = $3 WHERE id = $1 RETURNING id, name, slug",
        )
        .bind(tag.id)
        .bind(&tag.name)
        .bind(&tag.slug)
        .fetch_optional(&self.pool)
        .await;

        map_conflict(result.map_err(AppError::from), "Tag name or slug already exists")
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
