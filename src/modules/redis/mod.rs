//! Redis module for dead-letter lists
//!
//! Provides a connection-managed list client used by the activity
//! dead-letter queues.

mod redis_client;

pub use redis_client::RedisListClient;
