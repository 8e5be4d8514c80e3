use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::activities::dtos::MemberActivityMessage;

/// Activity message the listener could not apply (`listener_dead_letters`).
/// `payload` is the serialised [`MemberActivityMessage`].
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ListenerDeadLetter {
    pub id: Uuid,
    pub message_key: String,
    pub payload: String,
    pub is_completed: bool,
    pub is_editing: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListenerDeadLetter {
    pub fn new(
        message_key: impl Into<String>,
        payload: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            message_key: message_key.into(),
            payload: payload.into(),
            is_completed: false,
            is_editing: false,
            published_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Published at the event's own timestamp
    pub fn from_message(message: &MemberActivityMessage) -> Result<Self> {
        Ok(Self::new(
            message.key.clone(),
            serde_json::to_string(message)?,
            Some(message.event.created_at.and_utc()),
        ))
    }
}
