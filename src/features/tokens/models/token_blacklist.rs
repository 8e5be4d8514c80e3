use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Revoked access token, kept until it would have expired anyway
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TokenBlacklist {
    pub id: Uuid,
    pub jti: String,
    pub member_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TokenBlacklist {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
