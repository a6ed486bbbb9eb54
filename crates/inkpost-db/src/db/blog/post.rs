use inkpost_core::{models::Post, pagination::PagePlan, AppError};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::seek::{push_order_by, push_seek_predicate};

const POST_COLUMNS: &str = "p.id, p.category_id, p.author_id, p.title, p.slug, p.content, \
     p.excerpt, p.cover_image_url, p.status, p.view_count, p.published_at, p.created_at, p.updated_at";

/// Repository for blog posts
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one keyset page (`plan.fetch_limit` rows, the last one is the has-more probe).
    #[tracing::instrument(skip(self, plan), fields(db.table = "posts", db.operation = "select", sort = %plan.sort_field))]
    pub async fn fetch_page(&self, plan: &PagePlan) -> Result<Vec<Post>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(POST_COLUMNS).push(" FROM posts p");

        if plan.filters.category_slug.is_some() {
            qb.push(" JOIN categories c ON c.id = p.category_id");
        }

        qb.push(" WHERE TRUE");

        if let Some(status) = &plan.filters.status {
            qb.push(" AND p.status = ").push_bind(status.clone());
        }
        if let Some(category) = &plan.filters.category_slug {
            qb.push(" AND c.slug = ").push_bind(category.clone());
        }
        if let Some(tag) = &plan.filters.tag_slug {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.slug = ",
            )
            .push_bind(tag.clone())
            .push(")");
        }
        if let Some(seek) = &plan.seek {
            qb.push(" AND ");
            push_seek_predicate(&mut qb, seek);
        }

        push_order_by(&mut qb, plan.sort_field, plan.order);
        qb.push(" LIMIT ").push_bind(plan.fetch_limit);

        let posts = qb.build_query_as::<Post>().fetch_all(&self.pool).await?;
        Ok(posts)
    }

    #[tracing::instrument(skip(self), fields(db.table = "posts", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<Postgres, Post>(&format!(
            "SELECT {} FROM posts p WHERE p.id = $1",
            POST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// True if another post (other than `exclude_id`) already uses `slug`.
    #[tracing::instrument(skip(self), fields(db.table = "posts", db.operation = "select"))]
    pub async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE slug = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    /// Insert a post and its tag links in one transaction.
    #[tracing::instrument(skip(self, post, tag_ids), fields(db.table = "posts", db.operation = "insert"))]
    pub async fn create(&self, post: &Post, tag_ids: &[i64]) -> Result<Post, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<Postgres, Post>(
            r#"
            INSERT INTO posts (category_id, author_id, title, slug, content, excerpt,
                               cover_image_url, status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, category_id, author_id, title, slug, content, excerpt,
                      cover_image_url, status, view_count, published_at, created_at, updated_at
            "#,
        )
        .bind(post.category_id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.cover_image_url)
        .bind(&post.status)
        .bind(post.published_at)
        .fetch_one(&mut *tx)
        .await?;

        link_tags(&mut tx, created.id, tag_ids).await?;
        tx.commit().await?;

        Ok(created)
    }

    /// Write every mutable column of `post`; replace its tag links when `tag_ids` is given.
    #[tracing::instrument(skip(self, post, tag_ids), fields(db.table = "posts", db.operation = "update", db.record_id = %post.id))]
    pub async fn save(&self, post: &Post, tag_ids: Option<&[i64]>) -> Result<Option<Post>, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<Postgres, Post>(
            r#"
            UPDATE posts
            SET category_id = $2, title = $3, slug = $4, content = $5, excerpt = $6,
                cover_image_url = $7, status = $8, published_at = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING id, category_id, author_id, title, slug, content, excerpt,
                      cover_image_url, status, view_count, published_at, created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(post.category_id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.cover_image_url)
        .bind(&post.status)
        .bind(post.published_at)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(tag_ids) = tag_ids {
            sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
                .bind(post.id)
                .execute(&mut *tx)
                .await?;
            link_tags(&mut tx, post.id, tag_ids).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a post (comments and tag links cascade). Returns false if it did not exist.
    #[tracing::instrument(skip(self), fields(db.table = "posts", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "posts", db.operation = "update", db.record_id = %id))]
    pub async fn increment_view_count(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

async fn link_tags(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<(), AppError> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO post_tags (post_id, tag_id) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(tag_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
