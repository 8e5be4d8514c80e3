use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::core::error::{AppError, Result};
use crate::features::jwt_keys::models::JwtKey;

#[async_trait]
pub trait JwtKeyStore: Send + Sync {
    /// Newest key that is both primary and active
    async fn find_primary_key(&self) -> Result<Option<JwtKey>>;

    /// Every primary and active key, newest first
    async fn find_all_primary_keys(&self) -> Result<Vec<JwtKey>>;

    /// Active keys whose `expires_at` is before `now`
    async fn find_expired_keys(&self, now: DateTime<Utc>) -> Result<Vec<JwtKey>>;

    async fn update_all(&self, keys: &[JwtKey]) -> Result<()>;

    /// Save the demoted keys and the new primary key together
    async fn save_rotation(&self, demoted: &[JwtKey], new_key: &JwtKey) -> Result<()>;
}

const SELECT_KEY: &str = r#"
    SELECT id, key_id, secret_key, is_primary, is_active, created_at, updated_at, expires_at
    FROM jwt_keys
"#;

pub struct PgJwtKeyStore {
    pool: PgPool,
}

impl PgJwtKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin jwt key transaction: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn update_in(tx: &mut Transaction<'static, Postgres>, keys: &[JwtKey]) -> Result<()> {
        for key in keys {
            sqlx::query(
                r#"
                UPDATE jwt_keys
                SET is_primary = $2, is_active = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(key.id)
            .bind(key.is_primary)
            .bind(key.is_active)
            .bind(key.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update jwt key {}: {:?}", key.key_id, e);
                AppError::Database(e)
            })?;
        }
        Ok(())
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> Result<()> {
        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit jwt keys: {:?}", e);
            AppError::Database(e)
        })
    }
}

#[async_trait]
impl JwtKeyStore for PgJwtKeyStore {
    async fn find_primary_key(&self) -> Result<Option<JwtKey>> {
        sqlx::query_as::<_, JwtKey>(&format!(
            "{} WHERE is_primary = TRUE AND is_active = TRUE ORDER BY created_at DESC LIMIT 1",
            SELECT_KEY
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find primary jwt key: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn find_all_primary_keys(&self) -> Result<Vec<JwtKey>> {
        sqlx::query_as::<_, JwtKey>(&format!(
            "{} WHERE is_primary = TRUE AND is_active = TRUE ORDER BY created_at DESC",
            SELECT_KEY
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list primary jwt keys: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn find_expired_keys(&self, now: DateTime<Utc>) -> Result<Vec<JwtKey>> {
        sqlx::query_as::<_, JwtKey>(&format!(
            "{} WHERE is_active = TRUE AND expires_at < $1",
            SELECT_KEY
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find expired jwt keys: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn update_all(&self, keys: &[JwtKey]) -> Result<()> {
        let mut tx = self.begin().await?;
        Self::update_in(&mut tx, keys).await?;
        Self::commit(tx).await
    }

    async fn save_rotation(&self, demoted: &[JwtKey], new_key: &JwtKey) -> Result<()> {
        let mut tx = self.begin().await?;
        Self::update_in(&mut tx, demoted).await?;

        sqlx::query(
            r#"
            INSERT INTO jwt_keys
                (id, key_id, secret_key, is_primary, is_active, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(new_key.id)
        .bind(&new_key.key_id)
        .bind(&new_key.secret_key)
        .bind(new_key.is_primary)
        .bind(new_key.is_active)
        .bind(new_key.created_at)
        .bind(new_key.updated_at)
        .bind(new_key.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert jwt key: {:?}", e);
            AppError::Database(e)
        })?;

        Self::commit(tx).await
    }
}

#[cfg(test)]
pub use memory::InMemoryJwtKeyStore;
