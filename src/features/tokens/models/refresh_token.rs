use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Issued refresh token (`jwt_refresh_tokens` table)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token_id: String,
    pub member_id: i64,
    pub token_value: String,
    pub access_token_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
