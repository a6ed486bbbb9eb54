use inkpost_core::{models::Category, AppError};
use sqlx::{PgPool, Postgres};

/// Repository for post categories
#[derive(Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<Postgres, Category>(
            "SELECT id, name, slug, description FROM categories ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<Postgres, Category>(
            "SELECT id, name, slug, description FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Batch lookup for listings
    #[tracing::instrument(skip(self, ids), fields(db.table = "categories", db.operation = "select", count = ids.len()))]
    pub async fn get_many(&self, ids: &[i64]) -> Result<Vec<Category>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let categories = sqlx::query_as::<Postgres, Category>(
            "SELECT id, name, slug, description FROM categories WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Insert a category. Duplicate name or slug maps to `Conflict`.
    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "insert"))]
    pub async fn create(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category, AppError> {
        let result = sqlx::query_as::<Postgres, Category>(
            r#"
            INSERT INTO categories (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, description
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(&self.pool)
        .await;

        map_conflict(result.map_err(AppError::from), "Category name or slug already exists")
    }

    /// Overwrite name, slug and description.
    #[tracing::instrument(skip(self, category), fields(db.table = "categories", db.operation = "update", db.record_id = %category.id))]
    pub async fn save(&self, category: &Category) -> Result<Option<Category>, AppError> {
        let result = sqlx::query_as::<Postgres, Category>(
            r#"
            UPDATE categories SET name = $2, slug = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, slug, description
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .fetch_optional(&self.pool)
        .await;

        map_conflict(result.map_err(AppError::from), "Category name or slug already exists")
    }

    /// Delete a category; its posts are detached by the foreign key.
    #[tracing::instrument(skip(self), fields(db.table = "categories", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Turn a unique violation into a 409 with a readable message.
pub(crate) fn map_conflict<T>(result: Result<T, AppError>, message: &str) -> Result<T, AppError> {
    match result {
        Err(e) if e.is_unique_violation() => Err(AppError::Conflict(message.to_string())),
        other => other,
    }
}
