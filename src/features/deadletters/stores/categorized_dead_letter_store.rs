use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::deadletters::models::{CategorizedDeadLetter, DeadLetterSource};

#[async_trait]
pub trait CategorizedDeadLetterStore: Send + Sync {
    /// Up to `limit` incomplete dead letters of `source`, newest first,
    /// skipping `exclude_ids`
    async fn find_pending(
        &self,
        source: DeadLetterSource,
        limit: i64,
        exclude_ids: &[Uuid],
    ) -> Result<Vec<CategorizedDeadLetter>>;

    /// Returns the number of rows updated
    async fn mark_completed(&self, source: DeadLetterSource, ids: &[Uuid]) -> Result<u64>;
}

pub struct PgCategorizedDeadLetterStore {
    pool: PgPool,
}

impl PgCategorizedDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategorizedDeadLetterStore for PgCategorizedDeadLetterStore {
    async fn find_pending(
        &self,
        source: DeadLetterSource,
        limit: i64,
        exclude_ids: &[Uuid],
    ) -> Result<Vec<CategorizedDeadLetter>> {
        let sql = format!(
            r#"
            SELECT id, category, payload, message_key, is_completed, created_at, updated_at
            FROM {}
            WHERE is_completed = FALSE AND NOT (id = ANY($2))
            ORDER BY created_at DESC
            LIMIT $1
            "#,
            source.table()
        );

        sqlx::query_as::<_, CategorizedDeadLetter>(&sql)
            .bind(limit)
            .bind(exclude_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to read {}: {:?}", source.table(), e);
                AppError::Database(e)
            })
    }

    async fn mark_completed(&self, source: DeadLetterSource, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE {} SET is_completed = TRUE, updated_at = $2 WHERE id = ANY($1)",
            source.table()
        );
        let result = sqlx::query(&sql)
            .bind(ids)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to complete {} rows: {:?}", source.table(), e);
                AppError::Database(e)
            })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub use memory::InMemoryCategorizedDeadLetterStore;

#[cfg(test)]
mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryCategorizedDeadLetterStore {
        rows: Mutex<HashMap<DeadLetterSource, Vec<CategorizedDeadLetter>>>,
        fail_reads: AtomicBool,
    }

    impl InMemoryCategorizedDeadLetterStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, source: DeadLetterSource, letter: CategorizedDeadLetter) {
            self.rows
                .lock()
                .unwrap()
                .entry(source)
                .or_default()
                .push(letter);
        }

        pub fn rows(&self, source: DeadLetterSource) -> Vec<CategorizedDeadLetter> {
            self.rows
                .lock()
                .unwrap()
                .get(&source)
                .cloned()
                .unwrap_or_default()
        }

        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CategorizedDeadLetterStore for InMemoryCategorizedDeadLetterStore {
        async fn find_pending(
            &self,
            source: DeadLetterSource,
            limit: i64,
            exclude_ids: &[Uuid],
        ) -> Result<Vec<CategorizedDeadLetter>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::Internal(format!("{} unavailable", source.table())));
            }
            let mut pending: Vec<CategorizedDeadLetter> = self
                .rows(source)
                .into_iter()
                .filter(|row| !row.is_completed && !exclude_ids.contains(&row.id))
                .collect();
            pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            pending.truncate(limit.max(0) as usize);
            Ok(pending)
        }

        async fn mark_completed(&self, source: DeadLetterSource, ids: &[Uuid]) -> Result<u64> {
            let mut rows = self.rows.lock().unwrap();
            let mut updated = 0;
            for row in rows.entry(source).or_default().iter_mut() {
                if ids.contains(&row.id) {
                    row.is_completed = true;
                    updated += 1;
                }
            }
            Ok(updated)
        }
    }
}
