use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::error::{AppError, Result};
use crate::features::activities::models::MemberActivity;

/// Persistence of restored member activities
#[async_trait]
pub trait MemberActivityStore: Send + Sync {
    /// Insert all rows in one transaction
    async fn insert_all(&self, activities: &[MemberActivity]) -> Result<()>;

    /// Insert, or update the row with the same message key. `created_at` of
    /// an existing row is kept. Keyless activities are always inserted.
    async fn upsert_all(&self, activities: &[MemberActivity]) -> Result<()>;

    /// Subset of `keys` already present
    async fn find_existing_message_keys(&self, keys: &[String]) -> Result<HashSet<String>>;
}

pub struct PgMemberActivityStore {
    pool: PgPool,
}

impl PgMemberActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_all(&self, activities: &[MemberActivity], sql: &str, action: &str) -> Result<()> {
        if activities.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin member activity transaction: {:?}", e);
            AppError::Database(e)
        })?;

        for activity in activities {
            sqlx::query(sql)
                .bind(activity.id)
                .bind(activity.member_id)
                .bind(activity.post_id)
                .bind(activity.comment_id)
                .bind(activity.member_activity_type)
                .bind(&activity.message_key)
                .bind(activity.created_at)
                .bind(activity.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to {} member activity: {:?}", action, e);
                    AppError::Database(e)
                })?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit member activities: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::debug!("{} {} member activities", action, activities.len());
        Ok(())
    }
}

const INSERT_ACTIVITY: &str = r#"
    INSERT INTO member_activities
        (id, member_id, post_id, comment_id, member_activity_type, message_key, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

const UPSERT_ACTIVITY: &str = r#"
    INSERT INTO member_activities
        (id, member_id, post_id, comment_id, member_activity_type, message_key, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (message_key) DO UPDATE
    SET member_id = EXCLUDED.member_id,
        post_id = EXCLUDED.post_id,
        comment_id = EXCLUDED.comment_id,
        member_activity_type = EXCLUDED.member_activity_type,
        updated_at = EXCLUDED.updated_at
"#;

#[async_trait]
impl MemberActivityStore for PgMemberActivityStore {
    async fn insert_all(&self, activities: &[MemberActivity]) -> Result<()> {
        self.write_all(activities, INSERT_ACTIVITY, "insert").await
    }

    async fn upsert_all(&self, activities: &[MemberActivity]) -> Result<()> {
        self.write_all(activities, UPSERT_ACTIVITY, "upsert").await
    }

    async fn find_existing_message_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT message_key FROM member_activities WHERE message_key = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up member activity keys: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(existing.into_iter().collect())
    }
}

#[cfg(test)]
pub use memory::InMemoryMemberActivityStore;

#[cfg(test)]
mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryMemberActivityStore {
        rows: Mutex<Vec<MemberActivity>>,
        fail_writes: AtomicBool,
    }

    impl InMemoryMemberActivityStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn rows(&self) -> Vec<MemberActivity> {
            self.rows.lock().unwrap().clone()
        }

        pub fn seed(&self, activity: MemberActivity) {
            self.rows.lock().unwrap().push(activity);
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(AppError::Internal("member_activities unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MemberActivityStore for InMemoryMemberActivityStore {
        async fn insert_all(&self, activities: &[MemberActivity]) -> Result<()> {
            self.check_writable()?;
            self.rows.lock().unwrap().extend_from_slice(activities);
            Ok(())
        }

        async fn upsert_all(&self, activities: &[MemberActivity]) -> Result<()> {
            self.check_writable()?;
            let mut rows = self.rows.lock().unwrap();
            for activity in activities {
                let existing = activity.message_key.as_ref().and_then(|key| {
                    rows.iter()
                        .position(|row| row.message_key.as_ref() == Some(key))
                });
                match existing {
                    Some(index) => {
                        let row = &mut rows[index];
                        row.member_id = activity.member_id;
                        row.post_id = activity.post_id;
                        row.comment_id = activity.comment_id;
                        row.member_activity_type = activity.member_activity_type;
                        row.updated_at = activity.updated_at;
                    }
                    None => rows.push(activity.clone()),
                }
            }
            Ok(())
        }

        async fn find_existing_message_keys(&self, keys: &[String]) -> Result<HashSet<String>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter_map(|row| row.message_key.clone())
                .filter(|key| keys.contains(key))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::activities::models::MemberActivityType;

    #[tokio::test]
    async fn test_upsert_updates_by_message_key() {
        let store = InMemoryMemberActivityStore::new();
        let first = MemberActivity::post(1, 10, MemberActivityType::PostCreate, Some("k".into()));
        store.upsert_all(&[first.clone()]).await.unwrap();

        let second = MemberActivity::post(1, 10, MemberActivityType::PostUpdate, Some("k".into()));
        store.upsert_all(&[second]).await.unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].created_at, first.created_at);
        assert_eq!(rows[0].member_activity_type, MemberActivityType::PostUpdate);
    }

    #[tokio::test]
    async fn test_upsert_without_key_inserts() {
        let store = InMemoryMemberActivityStore::new();
        let activity = MemberActivity::member(1, MemberActivityType::MemberFollow, None);
        store
            .upsert_all(&[activity.clone(), activity])
            .await
            .unwrap();
        assert_eq!(store.rows().len(), 2);
    }
}
