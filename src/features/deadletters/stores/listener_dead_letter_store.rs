use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::deadletters::models::ListenerDeadLetter;

#[async_trait]
pub trait ListenerDeadLetterStore: Send + Sync {
    /// Up to `limit` incomplete rows, newest first, skipping `exclude_ids`
    async fn find_pending(&self, limit: i64, exclude_ids: &[Uuid]) -> Result<Vec<ListenerDeadLetter>>;

    /// Subset of `keys` already stored
    async fn find_existing_message_keys(&self, keys: &[String]) -> Result<HashSet<String>>;

    /// Insert all rows in one transaction
    async fn insert_all(&self, letters: &[ListenerDeadLetter]) -> Result<()>;

    async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64>;
}

pub struct PgListenerDeadLetterStore {
    pool: PgPool,
}

impl PgListenerDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListenerDeadLetterStore for PgListenerDeadLetterStore {
    async fn find_pending(&self, limit: i64, exclude_ids: &[Uuid]) -> Result<Vec<ListenerDeadLetter>> {
        sqlx::query_as::<_, ListenerDeadLetter>(
            r#"
            SELECT id, message_key, payload, is_completed, is_editing, published_at,
                   created_at, updated_at
            FROM listener_dead_letters
            WHERE is_completed = FALSE AND NOT (id = ANY($2))
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(exclude_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read listener dead letters: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn find_existing_message_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT message_key FROM listener_dead_letters WHERE message_key = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up listener dead letter keys: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(existing.into_iter().collect())
    }

    async fn insert_all(&self, letters: &[ListenerDeadLetter]) -> Result<()> {
        if letters.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin listener dead letter transaction: {:?}", e);
            AppError::Database(e)
        })?;

        for letter in letters {
            sqlx::query(
                r#"
                INSERT INTO listener_dead_letters
                    (id, message_key, payload, is_completed, is_editing, published_at,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(letter.id)
            .bind(&letter.message_key)
            .bind(&letter.payload)
            .bind(letter.is_completed)
            .bind(letter.is_editing)
            .bind(letter.published_at)
            .bind(letter.created_at)
            .bind(letter.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to insert listener dead letter {}: {:?}",
                    letter.message_key,
                    e
                );
                AppError::Database(e)
            })?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit listener dead letters: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE listener_dead_letters SET is_completed = TRUE, updated_at = $2 WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to complete listener dead letters: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub use memory::InMemoryListenerDeadLetterStore;

#[cfg(test)]
mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryListenerDeadLetterStore {
        rows: Mutex<Vec<ListenerDeadLetter>>,
        fail_writes: AtomicBool,
    }

    impl InMemoryListenerDeadLetterStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, letter: ListenerDeadLetter) {
            self.rows.lock().unwrap().push(letter);
        }

        pub fn rows(&self) -> Vec<ListenerDeadLetter> {
            self.rows.lock().unwrap().clone()
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ListenerDeadLetterStore for InMemoryListenerDeadLetterStore {
        async fn find_pending(
            &self,
            limit: i64,
            exclude_ids: &[Uuid],
        ) -> Result<Vec<ListenerDeadLetter>> {
            let mut pending: Vec<ListenerDeadLetter> = self
                .rows()
                .into_iter()
                .filter(|row| !row.is_completed && !exclude_ids.contains(&row.id))
                .collect();
            pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            pending.truncate(limit.max(0) as usize);
            Ok(pending)
        }

        async fn find_existing_message_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|row| keys.contains(&row.message_key))
                .map(|row| row.message_key.clone())
                .collect())
        }

        async fn insert_all(&self, letters: &[ListenerDeadLetter]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Internal("listener_dead_letters unavailable".to_string()));
            }
            let mut rows = self.rows.lock().unwrap();
            if let Some(dup) = letters
                .iter()
                .find(|l| rows.iter().any(|r| r.message_key == l.message_key))
            {
                return Err(AppError::Conflict(format!(
                    "duplicate message key {}",
                    dup.message_key
                )));
            }
            rows.extend_from_slice(letters);
            Ok(())
        }

        async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64> {
            let mut updated = 0;
            for row in self.rows.lock().unwrap().iter_mut() {
                if ids.contains(&row.id) {
                    row.is_completed = true;
                    updated += 1;
                }
            }
            Ok(updated)
        }
    }
}
