use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::activities::dtos::MemberActivityMessage;

/// Activity message moved out of a Redis dead-letter list
/// (`redis_dead_letters`)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RedisDeadLetter {
    pub id: Uuid,
    pub message_key: String,
    pub payload: String,
    pub is_completed: bool,
    pub is_editing: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedisDeadLetter {
    pub fn new(message_key: impl Into<String>, payload: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            message_key: message_key.into(),
            payload: payload.into(),
            is_completed: false,
            is_editing: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_message(message: &MemberActivityMessage) -> Result<Self> {
        Ok(Self::new(message.key.clone(), serde_json::to_string(message)?))
    }
}
