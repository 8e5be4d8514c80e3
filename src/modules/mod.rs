//! Modules layer - Infrastructure components shared by the features
//!
//! Contains the batch execution engine and the Redis list client.

pub mod batch;
pub mod redis;
