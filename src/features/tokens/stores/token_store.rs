use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::tokens::models::{RefreshToken, TokenBlacklist};

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Tokens with `expires_at < now`
    async fn find_expired_tokens(&self, now: DateTime<Utc>) -> Result<Vec<RefreshToken>>;

    /// Returns the number of rows deleted
    async fn delete_all(&self, tokens: &[RefreshToken]) -> Result<u64>;
}

#[async_trait]
pub trait TokenBlacklistStore: Send + Sync {
    /// Entries with `expires_at < now`
    async fn find_expired_tokens(&self, now: DateTime<Utc>) -> Result<Vec<TokenBlacklist>>;

    /// Returns the number of rows deleted
    async fn delete_all(&self, entries: &[TokenBlacklist]) -> Result<u64>;
}

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn find_expired_tokens(&self, now: DateTime<Utc>) -> Result<Vec<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, token_id, member_id, token_value, access_token_id, expires_at,
                   is_revoked, device_info, ip_address, created_at, updated_at
            FROM jwt_refresh_tokens
            WHERE expires_at < $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find expired refresh tokens: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn delete_all(&self, tokens: &[RefreshToken]) -> Result<u64> {
        let ids: Vec<Uuid> = tokens.iter().map(|t| t.id).collect();
        delete_by_ids(&self.pool, "jwt_refresh_tokens", &ids).await
    }
}

pub struct PgTokenBlacklistStore {
    pool: PgPool,
}

impl PgTokenBlacklistStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBlacklistStore for PgTokenBlacklistStore {
    async fn find_expired_tokens(&self, now: DateTime<Utc>) -> Result<Vec<TokenBlacklist>> {
        sqlx::query_as::<_, TokenBlacklist>(
            r#"
            SELECT id, jti, member_id, expires_at, reason, created_at
            FROM jwt_blacklist
            WHERE expires_at < $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find expired blacklist entries: {:?}", e);
            AppError::Database(e)
        })
    }

    async fn delete_all(&self, entries: &[TokenBlacklist]) -> Result<u64> {
        let ids: Vec<Uuid> = entries.iter().map(|t| t.id).collect();
        delete_by_ids(&self.pool, "jwt_blacklist", &ids).await
    }
}

async fn delete_by_ids(pool: &PgPool, table: &str, ids: &[Uuid]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", table))
        .bind(ids)
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete from {}: {:?}", table, e);
            AppError::Database(e)
        })?;

    Ok(result.rows_affected())
}

#[cfg(test)]
pub use memory::{InMemoryRefreshTokenStore, InMemoryTokenBlacklistStore};

#[cfg(test)]
mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryRefreshTokenStore {
        tokens: Mutex<Vec<RefreshToken>>,
        fail_reads: AtomicBool,
    }

    impl InMemoryRefreshTokenStore {
        pub fn with_tokens(tokens: Vec<RefreshToken>) -> Self {
            Self {
                tokens: Mutex::new(tokens),
                fail_reads: AtomicBool::new(false),
            }
        }

        pub fn tokens(&self) -> Vec<RefreshToken> {
            self.tokens.lock().unwrap().clone()
        }

        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RefreshTokenStore for InMemoryRefreshTokenStore {
        async fn find_expired_tokens(&self, now: DateTime<Utc>) -> Result<Vec<RefreshToken>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::Internal("jwt_refresh_tokens unavailable".to_string()));
            }
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.is_expired(now))
                .cloned()
                .collect())
        }

        async fn delete_all(&self, tokens: &[RefreshToken]) -> Result<u64> {
            let mut stored = self.tokens.lock().unwrap();
            let before = stored.len();
            stored.retain(|t| !tokens.iter().any(|d| d.id == t.id));
            Ok((before - stored.len()) as u64)
        }
    }

    #[derive(Default)]
    pub struct InMemoryTokenBlacklistStore {
        entries: Mutex<Vec<TokenBlacklist>>,
        reads: Mutex<usize>,
    }

    impl InMemoryTokenBlacklistStore {
        pub fn with_entries(entries: Vec<TokenBlacklist>) -> Self {
            Self {
                entries: Mutex::new(entries),
                reads: Mutex::new(0),
            }
        }

        pub fn entries(&self) -> Vec<TokenBlacklist> {
            self.entries.lock().unwrap().clone()
        }

        pub fn reads(&self) -> usize {
            *self.reads.lock().unwrap()
        }
    }

    #[async_trait]
    impl TokenBlacklistStore for InMemoryTokenBlacklistStore {
        async fn find_expired_tokens(&self, now: DateTime<Utc>) -> Result<Vec<TokenBlacklist>> {
            *self.reads.lock().unwrap() += 1;
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.is_expired(now))
                .cloned()
                .collect())
        }

        async fn delete_all(&self, entries: &[TokenBlacklist]) -> Result<u64> {
            let mut stored = self.entries.lock().unwrap();
            let before = stored.len();
            stored.retain(|t| !entries.iter().any(|d| d.id == t.id));
            Ok((before - stored.len()) as u64)
        }
    }
}
