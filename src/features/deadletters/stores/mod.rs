mod categorized_dead_letter_store;
mod listener_dead_letter_store;
mod redis_dead_letter_store;

#[cfg(test)]
pub use categorized_dead_letter_store::InMemoryCategorizedDeadLetterStore;
pub use categorized_dead_letter_store::{
    CategorizedDeadLetterStore, PgCategorizedDeadLetterStore,
};
#[cfg(test)]
pub use listener_dead_letter_store::InMemoryListenerDeadLetterStore;
pub use listener_dead_letter_store::{ListenerDeadLetterStore, PgListenerDeadLetterStore};
#[cfg(test)]
pub use redis_dead_letter_store::InMemoryRedisDeadLetterStore;
pub use redis_dead_letter_store::{PgRedisDeadLetterStore, RedisDeadLetterStore};
