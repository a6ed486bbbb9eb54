use inkpost_core::{
    models::{Setting, UpsertSettingRequest},
    AppError,
};
use sqlx::{PgPool, Postgres};

/// Key/value site settings
#[derive(Clone)]
pub struct SettingRepository {
    pool: PgPool,
}

const UPSERT_SQL: &str = r#"
    INSERT INTO settings (key, value, type)
    VALUES ($1, $2, $3)
    ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, type = EXCLUDED.type, updated_at = NOW()
    RETURNING key, value, type
"#;

impl SettingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "settings", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Setting>, AppError> {
        let settings = sqlx::query_as::<Postgres, Setting>(
            "SELECT key, value, type FROM settings ORDER BY key ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }

    #[tracing::instrument(skip(self), fields(db.table = "settings", db.operation = "select"))]
    pub async fn get(&self, key: &str) -> Result<Option<Setting>, AppError> {
        let setting = sqlx::query_as::<Postgres, Setting>(
            "SELECT key, value, type FROM settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    #[tracing::instrument(skip(self, setting), fields(db.table = "settings", db.operation = "upsert", key = %setting.key))]
    pub async fn upsert(&self, setting: &UpsertSettingRequest) -> Result<Setting, AppError> {
        let saved = sqlx::query_as::<Postgres, Setting>(UPSERT_SQL)
            .bind(&setting.key)
            .bind(&setting.value)
            .bind(setting.value_type.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(saved)
    }

    /// Upsert all settings atomically: either every row is written or none.
    #[tracing::instrument(skip(self, settings), fields(db.table = "settings", db.operation = "upsert", count = settings.len()))]
    pub async fn upsert_batch(
        &self,
        settings: &[UpsertSettingRequest],
    ) -> Result<Vec<Setting>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(settings.len());

        for setting in settings {
            let row = sqlx::query_as::<Postgres, Setting>(UPSERT_SQL)
                .bind(&setting.key)
                .bind(&setting.value)
                .bind(setting.value_type.as_str())
                .fetch_one(&mut *tx)
                .await?;
            saved.push(row);
        }

        tx.commit().await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self), fields(db.table = "settings", db.operation = "delete"))]
    pub async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
