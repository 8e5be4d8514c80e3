use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::deadletters::models::RedisDeadLetter;

#[async_trait]
pub trait RedisDeadLetterStore: Send + Sync {
    /// Rows neither completed nor being edited, oldest first
    async fn find_unprocessed(&self) -> Result<Vec<RedisDeadLetter>>;

    /// Incomplete rows created before `cutoff`, oldest first
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<RedisDeadLetter>>;

    async fn insert_all(&self, letters: &[RedisDeadLetter]) -> Result<()>;

    async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64>;
}

const SELECT_LETTER: &str = r#"
    SELECT id, message_key, payload, is_completed, is_editing, created_at, updated_at
    FROM redis_dead_letters
"#;

pub struct PgRedisDeadLetterStore {
    pool: PgPool,
}

impl PgRedisDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RedisDeadLetterStore for PgRedisDeadLetterStore {
    async fn find_unprocessed(&self) -> Result<Vec<RedisDeadLetter>> {
        sqlx::query_as::<_, RedisDeadLetter>(&format!(
            "{} WHERE is_completed = FALSE AND is_editing = FALSE ORDER BY created_at",
            SELECT_LETTER
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read unprocessed redis dead letters: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<RedisDeadLetter>> {
        sqlx::query_as::<_, RedisDeadLetter>(&format!(
            "{} WHERE is_completed = FALSE AND created_at < $1 ORDER BY created_at",
            SELECT_LETTER
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read stale redis dead letters: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn insert_all(&self, letters: &[RedisDeadLetter]) -> Result<()> {
        if letters.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin redis dead letter transaction: {:?}", e);
            AppError::Database(e)
        })?;

        for letter in letters {
            sqlx::query(
                r#"
                INSERT INTO redis_dead_letters
                    (id, message_key, payload, is_completed, is_editing, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(letter.id)
            .bind(&letter.message_key)
            .bind(&letter.payload)
            .bind(letter.is_completed)
            .bind(letter.is_editing)
            .bind(letter.created_at)
            .bind(letter.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert redis dead letter: {:?}", e);
                AppError::Database(e)
            })?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit redis dead letters: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE redis_dead_letters SET is_completed = TRUE, updated_at = $2 WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to complete redis dead letters: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub use memory::InMemoryRedisDeadLetterStore;
