mod categorized_dead_letter;
mod listener_dead_letter;
mod redis_dead_letter;

pub use categorized_dead_letter::{CategorizedDeadLetter, DeadLetterSource};
pub use listener_dead_letter::ListenerDeadLetter;
pub use redis_dead_letter::RedisDeadLetter;
