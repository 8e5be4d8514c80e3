use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::features::activities::models::ActivityCategory;

/// Where a categorised dead letter was parked. Each source has its own table
/// with the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadLetterSource {
    KafkaPublisher,
    KafkaListener,
    Feign,
}

impl DeadLetterSource {
    pub fn table(&self) -> &'static str {
        match self {
            DeadLetterSource::KafkaPublisher => "kafka_publisher_dead_letters",
            DeadLetterSource::KafkaListener => "kafka_listener_dead_letters",
            DeadLetterSource::Feign => "feign_dead_letters",
        }
    }
}

/// Activity request that failed to publish or deliver; `payload` is the
/// request JSON for `category`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CategorizedDeadLetter {
    pub id: Uuid,
    pub category: ActivityCategory,
    pub payload: String,
    pub message_key: Option<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategorizedDeadLetter {
    pub fn new(category: ActivityCategory, payload: impl Into<String>, message_key: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            category,
            payload: payload.into(),
            message_key,
            is_completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}
