pub mod jobs;
pub mod models;
pub mod queue;
pub mod stores;

pub use jobs::DeadLetterJobs;
pub use queue::RedisActivityDeadLetterQueue;
pub use stores::{PgCategorizedDeadLetterStore, PgListenerDeadLetterStore, PgRedisDeadLetterStore};
