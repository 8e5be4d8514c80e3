//! Redis dead-letter lists of member activity messages
//!
//! Publishers park a failed message on the list of its activity type; the
//! listener parks messages it could not apply on a single listener list.
//! Values are JSON [`MemberActivityMessage`]s; popped values that do not
//! parse are moved to `<list>:invalid`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::features::activities::dtos::MemberActivityMessage;
use crate::features::activities::models::MemberActivityType;
use crate::modules::redis::RedisListClient;

const LISTENER_LIST: &str = "member_activity:listener:dead_letter";

pub fn activity_list_name(activity_type: MemberActivityType) -> String {
    format!("member_activity:dlq:{}", activity_type.as_str())
}

pub fn listener_list_name() -> &'static str {
    LISTENER_LIST
}

#[async_trait]
pub trait ActivityDeadLetterQueue: Send + Sync {
    /// Remove up to `count` messages from the head of the list for `activity_type`
    async fn pop_front(
        &self,
        activity_type: MemberActivityType,
        count: usize,
    ) -> Result<Vec<MemberActivityMessage>>;

    /// Append each message to the list of its own activity type
    async fn push_back_all(&self, messages: &[MemberActivityMessage]) -> Result<()>;

    async fn pop_front_listener(&self, count: usize) -> Result<Vec<MemberActivityMessage>>;

    async fn push_back_listener(&self, messages: &[MemberActivityMessage]) -> Result<()>;
}

pub struct RedisActivityDeadLetterQueue {
    client: RedisListClient,
}

impl RedisActivityDeadLetterQueue {
    pub fn new(client: RedisListClient) -> Self {
        Self { client }
    }

    async fn pop(&self, list: &str, count: usize) -> Result<Vec<MemberActivityMessage>> {
        let values = self.client.pop_front(list, count).await?;
        let (messages, invalid) = decode_values(list, values);
        if !invalid.is_empty() {
            self.set_aside(list, &invalid).await;
        }
        Ok(messages)
    }

    /// Park values that are not messages on `<list>:invalid` for inspection
    async fn set_aside(&self, list: &str, values: &[String]) {
        let target = invalid_list_name(list);
        match self.client.push_back(&target, values).await {
            Ok(()) => tracing::warn!("Moved {} unreadable values to {}", values.len(), target),
            Err(e) => tracing::error!(
                "Failed to move unreadable values to {}: {} (values: {:?})",
                target,
                e,
                values
            ),
        }
    }

    async fn push(&self, list: &str, messages: &[&MemberActivityMessage]) -> Result<()> {
        let values = messages
            .iter()
            .map(|m| serde_json::to_string(m))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.client.push_back(list, &values).await
    }
}

#[async_trait]
impl ActivityDeadLetterQueue for RedisActivityDeadLetterQueue {
    async fn pop_front(
        &self,
        activity_type: MemberActivityType,
        count: usize,
    ) -> Result<Vec<MemberActivityMessage>> {
        self.pop(&activity_list_name(activity_type), count).await
    }

    async fn push_back_all(&self, messages: &[MemberActivityMessage]) -> Result<()> {
        for (list, group) in group_by_list(messages) {
            self.push(&list, &group).await?;
        }
        Ok(())
    }

    async fn pop_front_listener(&self, count: usize) -> Result<Vec<MemberActivityMessage>> {
        self.pop(LISTENER_LIST, count).await
    }

    async fn push_back_listener(&self, messages: &[MemberActivityMessage]) -> Result<()> {
        let messages: Vec<&MemberActivityMessage> = messages.iter().collect();
        self.push(LISTENER_LIST, &messages).await
    }
}

pub fn invalid_list_name(list: &str) -> String {
    format!("{}:invalid", list)
}

/// Split popped values into messages and the raw values that did not parse
fn decode_values(list: &str, values: Vec<String>) -> (Vec<MemberActivityMessage>, Vec<String>) {
    let mut messages = Vec::with_capacity(values.len());
    let mut invalid = Vec::new();
    for value in values {
        match serde_json::from_str(&value) {
            Ok(message) => messages.push(message),
            Err(e) => {
                tracing::error!("Unreadable value in {}: {} ({})", list, value, e);
                invalid.push(value);
            }
        }
    }
    (messages, invalid)
}

fn group_by_list(messages: &[MemberActivityMessage]) -> BTreeMap<String, Vec<&MemberActivityMessage>> {
    let mut lists: BTreeMap<String, Vec<&MemberActivityMessage>> = BTreeMap::new();
    for message in messages {
        lists
            .entry(activity_list_name(message.event.member_activity_type))
            .or_default()
            .push(message);
    }
    lists
}

#[cfg(test)]
pub use memory::InMemoryActivityDeadLetterQueue;
