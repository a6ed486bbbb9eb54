//! Durable append-only streams with consumer groups on Postgres.
//!
//! Delivery is tracked per entry in `stream_deliveries`, not by a high-water
//! mark: ids come from a sequence and can commit out of order, so a group
//! claims whatever it has no delivery row for yet. Reads lock the group row,
//! so concurrent members of one group never receive the same entry. A
//! delivery stays pending until `acked_at` is set.

use inkpost_core::AppError;
use sqlx::{FromRow, PgPool, Postgres};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StreamEntry {
    pub id: i64,
    pub payload: String,
}

#[derive(Clone)]
pub struct StreamRepository {
    pool: PgPool,
}

impl StreamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the group if missing. A new group sees every retained entry.
    #[tracing::instrument(skip(self), fields(db.table = "stream_groups", db.operation = "insert"))]
    pub async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO stream_groups (stream, group_name)
            VALUES ($1, $2)
            ON CONFLICT (stream, group_name) DO NOTHING
            "#,
        )
        .bind(stream)
        .bind(group)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, payload), fields(db.table = "stream_entries", db.operation = "insert"))]
    pub async fn append(&self, stream: &str, payload: &str) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<Postgres, i64>(
            "INSERT INTO stream_entries (stream, payload) VALUES ($1, $2) RETURNING id",
        )
        .bind(stream)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Hand out up to `count` undelivered entries to `consumer`.
    #[tracing::instrument(skip(self), fields(db.table = "stream_entries", db.operation = "claim"))]
    pub async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: i64,
    ) -> Result<Vec<StreamEntry>, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<Postgres, i32>(
            "SELECT 1 FROM stream_groups WHERE stream = $1 AND group_name = $2 FOR UPDATE",
        )
        .bind(stream)
        .bind(group)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Consumer group {} on stream {}", group, stream))
        })?;

        let entries = sqlx::query_as::<Postgres, StreamEntry>(
            r#"
            SELECT e.id, e.payload
            FROM stream_entries e
            WHERE e.stream = $1
              AND NOT EXISTS (
                  SELECT 1 FROM stream_deliveries d
                  WHERE d.stream = e.stream AND d.group_name = $2 AND d.entry_id = e.id
              )
            ORDER BY e.id ASC
            LIMIT $3
            FOR UPDATE OF e SKIP LOCKED
            "#,
        )
        .bind(stream)
        .bind(group)
        .bind(count)
        .fetch_all(&mut *tx)
        .await?;

        if !entries.is_empty() {
            let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();

            sqlx::query(
                r#"
                INSERT INTO stream_deliveries (stream, group_name, entry_id, consumer)
                SELECT $1, $2, UNNEST($3::bigint[]), $4
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(stream)
            .bind(group)
            .bind(&ids)
            .bind(consumer)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(entries)
    }

    /// Acknowledge one delivery. Entries every group has acknowledged are
    /// trimmed. Returns false if nothing was pending.
    #[tracing::instrument(skip(self), fields(db.table = "stream_deliveries", db.operation = "update"))]
    pub async fn ack(&self, stream: &str, group: &str, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE stream_deliveries SET acked_at = NOW()
            WHERE stream = $1 AND group_name = $2 AND entry_id = $3 AND acked_at IS NULL
            "#,
        )
        .bind(stream)
        .bind(group)
        .bind(id)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM stream_entries e
            WHERE e.id = $2 AND e.stream = $1
              AND NOT EXISTS (
                  SELECT 1 FROM stream_groups g
                  WHERE g.stream = e.stream
                    AND NOT EXISTS (
                        SELECT 1 FROM stream_deliveries d
                        WHERE d.stream = g.stream AND d.group_name = g.group_name
                          AND d.entry_id = e.id AND d.acked_at IS NOT NULL
                    )
              )
            "#,
        )
        .bind(stream)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of delivered but unacknowledged entries for a group.
    #[tracing::instrument(skip(self), fields(db.table = "stream_deliveries", db.operation = "count"))]
    pub async fn pending_count(&self, stream: &str, group: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM stream_deliveries WHERE stream = $1 AND group_name = $2 AND acked_at IS NULL",
        )
        .bind(stream)
        .bind(group)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
