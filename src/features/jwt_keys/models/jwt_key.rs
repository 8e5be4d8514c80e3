use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// HS256 signing key shared with the member service (`jwt_keys` table)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct JwtKey {
    pub id: Uuid,
    /// Published as the `kid` header of issued tokens
    pub key_id: String,
    /// Base64 of the raw key bytes
    pub secret_key: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl JwtKey {
    /// New active primary key, valid for the rotation period plus the grace
    /// period
    pub fn new_key(secret_key: String, rotation_hours: i64, grace_period_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            key_id: Uuid::new_v4().to_string(),
            secret_key,
            is_primary: true,
            is_active: true,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(rotation_hours + grace_period_hours),
        }
    }

    /// Keep verifying with this key but stop signing with it
    pub fn demote(&mut self) {
        self.is_primary = false;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    pub fn is_rotation_due(&self, rotation_hours: i64, now: DateTime<Utc>) -> bool {
        self.created_at + Duration::hours(rotation_hours) < now
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_hours()
    }
}
