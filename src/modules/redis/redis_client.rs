//! Redis list client
//!
//! Thin wrapper over a multiplexed [`ConnectionManager`] exposing the list
//! operations the dead-letter queues need. Keys are namespaced with the
//! configured prefix.

use std::num::NonZeroUsize;
use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::core::config::RedisConfig;
use crate::core::error::AppError;

#[derive(Clone)]
pub struct RedisListClient {
    client: redis::Client,
    connection: Arc<OnceCell<ConnectionManager>>,
    key_prefix: String,
}

impl RedisListClient {
    /// Validate the URL without connecting. The connection is made on the
    /// first list operation.
    pub fn open(config: &RedisConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: redis::Client::open(config.url.as_str())?,
            connection: Arc::new(OnceCell::new()),
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Open and connect right away. The manager reconnects on its own after
    /// the first successful connection.
    pub async fn connect(config: &RedisConfig) -> Result<Self, AppError> {
        let client = Self::open(config)?;
        client.connection().await?;
        Ok(client)
    }

    async fn connection(&self) -> Result<ConnectionManager, AppError> {
        let manager = self
            .connection
            .get_or_try_init(|| self.client.get_connection_manager())
            .await?;
        Ok(manager.clone())
    }

    pub fn key(&self, name: &str) -> String {
        prefixed_key(&self.key_prefix, name)
    }

    /// Remove and return up to `count` values from the head of the list
    pub async fn pop_front(&self, name: &str, count: usize) -> Result<Vec<String>, AppError> {
        let Some(count) = NonZeroUsize::new(count) else {
            return Ok(Vec::new());
        };
        let key = self.key(name);
        let mut connection = self.connection().await?;
        let values: Vec<String> = connection.lpop(&key, Some(count)).await?;
        debug!("Popped {} values from {}", values.len(), key);
        Ok(values)
    }

    /// Append values to the tail of the list
    pub async fn push_back(&self, name: &str, values: &[String]) -> Result<(), AppError> {
        if values.is_empty() {
            return Ok(());
        }
        let key = self.key(name);
        let mut connection = self.connection().await?;
        let _: i64 = connection.rpush(&key, values).await?;
        debug!("Pushed {} values back to {}", values.len(), key);
        Ok(())
    }
}

fn prefixed_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_does_not_connect() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            key_prefix: "dailyfeed".to_string(),
        };
        let client = RedisListClient::open(&config).unwrap();
        assert_eq!(client.key("jobs"), "dailyfeed:jobs");

        let config = RedisConfig {
            url: "not a url".to_string(),
            key_prefix: String::new(),
        };
        assert!(RedisListClient::open(&config).is_err());
    }

    #[test]
    fn test_prefixed_key() {
        assert_eq!(
            prefixed_key("dailyfeed", "member_activity:dlq:POST_CREATE"),
            "dailyfeed:member_activity:dlq:POST_CREATE"
        );
        assert_eq!(prefixed_key("", "plain"), "plain");
    }
}
