use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::features::activities::dtos::MemberActivityMessage;
use crate::features::deadletters::jobs::readers::ActivityQueueReader;
use crate::features::deadletters::jobs::{
    step_name, DeadLetterJobs, KAFKA_FAILURE_RECOVERY_FROM_REDIS_JOB,
    LISTENER_RESTORE_FROM_REDIS_JOB,
};
use crate::features::deadletters::models::{ListenerDeadLetter, RedisDeadLetter};
use crate::features::deadletters::queue::ActivityDeadLetterQueue;
use crate::features::deadletters::stores::{ListenerDeadLetterStore, RedisDeadLetterStore};
use crate::modules::batch::{ChunkComponents, ChunkStep, ItemProcessor, ItemWriter, Job};

const PER_TYPE_BATCH: usize = 30;

/// Rows built from popped Redis messages, with the messages themselves so a
/// failed write can put them back
#[derive(Debug)]
pub(super) struct QueuedBatch<T> {
    pub items: Vec<T>,
    pub messages: Vec<MemberActivityMessage>,
}

impl<T> QueuedBatch<T> {
    pub fn merge(batches: Vec<QueuedBatch<T>>) -> QueuedBatch<T> {
        let mut merged = QueuedBatch {
            items: Vec::new(),
            messages: Vec::new(),
        };
        for batch in batches {
            merged.items.extend(batch.items);
            merged.messages.extend(batch.messages);
        }
        merged
    }
}

/// Turns each popped message into a row; messages that cannot be converted
/// go straight back to their list
struct MessageRowProcessor<T> {
    queue: Arc<dyn ActivityDeadLetterQueue>,
    convert: fn(&MemberActivityMessage) -> Result<T>,
}

#[async_trait]
impl<T: Send + Sync> ItemProcessor<Vec<MemberActivityMessage>, QueuedBatch<T>>
    for MessageRowProcessor<T>
{
    async fn process(
        &self,
        messages: Vec<MemberActivityMessage>,
    ) -> Result<Option<QueuedBatch<T>>> {
        let mut items = Vec::with_capacity(messages.len());
        let mut converted = Vec::with_capacity(messages.len());
        let mut rejected = Vec::new();

        for message in messages {
            match (self.convert)(&message) {
                Ok(item) => {
                    items.push(item);
                    converted.push(message);
                }
                Err(e) => {
                    tracing::error!(
                        "Error processing message: key={}, activityType={}, error={}",
                        message.key,
                        message.event.member_activity_type,
                        e
                    );
                    rejected.push(message);
                }
            }
        }

        if !rejected.is_empty() {
            if let Err(e) = self.queue.push_back_all(&rejected).await {
                tracing::error!("Failed to return {} messages to Redis: {}", rejected.len(), e);
            }
        }

        tracing::info!(
            "Processed {} messages into {} rows",
            items.len() + rejected.len(),
            items.len()
        );
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(QueuedBatch {
            items,
            messages: converted,
        }))
    }
}

async fn roll_back(queue: &dyn ActivityDeadLetterQueue, messages: &[MemberActivityMessage]) {
    match queue.push_back_all(messages).await {
        Ok(()) => tracing::warn!(
            "Rolled back {} messages to Redis DLQ after save failure",
            messages.len()
        ),
        Err(e) => tracing::error!(
            "CRITICAL: Failed to roll back {} messages to Redis DLQ: {}",
            messages.len(),
            e
        ),
    }
}

struct RedisLetterWriter {
    letters: Arc<dyn RedisDeadLetterStore>,
    queue: Arc<dyn ActivityDeadLetterQueue>,
}

#[async_trait]
impl ItemWriter<QueuedBatch<RedisDeadLetter>> for RedisLetterWriter {
    async fn write(&self, batches: Vec<QueuedBatch<RedisDeadLetter>>) -> Result<()> {
        let batch = QueuedBatch::merge(batches);
        if batch.items.is_empty() {
            tracing::info!("No documents to save in this chunk");
            return Ok(());
        }

        if let Err(e) = self.letters.insert_all(&batch.items).await {
            tracing::error!("Failed to save redis dead letters: {}", e);
            roll_back(self.queue.as_ref(), &batch.messages).await;
            return Err(e);
        }

        tracing::info!(
            "Saved {} redis dead letters to redis_dead_letters",
            batch.items.len()
        );
        Ok(())
    }
}

pub fn kafka_failure_recovery_from_redis_job(jobs: &DeadLetterJobs) -> Job {
    let letters = Arc::clone(&jobs.redis_letters);
    let queue = Arc::clone(&jobs.queue);
    let name = KAFKA_FAILURE_RECOVERY_FROM_REDIS_JOB;

    Job::new(name).start(ChunkStep::new(step_name(name), 1, move |_params| {
        Ok(ChunkComponents::new(
            ActivityQueueReader::new(Arc::clone(&queue), PER_TYPE_BATCH),
            MessageRowProcessor {
                queue: Arc::clone(&queue),
                convert: RedisDeadLetter::from_message,
            },
            RedisLetterWriter {
                letters: Arc::clone(&letters),
                queue: Arc::clone(&queue),
            },
        ))
    }))
}

/// Inserts listener dead letters whose message key is new
struct ListenerLetterWriter {
    letters: Arc<dyn ListenerDeadLetterStore>,
    queue: Arc<dyn ActivityDeadLetterQueue>,
}

impl ListenerLetterWriter {
    async fn save_new(&self, letters: Vec<ListenerDeadLetter>) -> Result<usize> {
        let keys: Vec<String> = letters.iter().map(|l| l.message_key.clone()).collect();
        let existing = self.letters.find_existing_message_keys(&keys).await?;
        tracing::info!(
            "Found {} existing messageKeys in listener_dead_letters",
            existing.len()
        );

        let mut seen = HashSet::new();
        let fresh: Vec<ListenerDeadLetter> = letters
            .into_iter()
            .filter(|l| !existing.contains(&l.message_key) && seen.insert(l.message_key.clone()))
            .collect();

        if !fresh.is_empty() {
            self.letters.insert_all(&fresh).await?;
        }
        Ok(fresh.len())
    }
}

#[async_trait]
impl ItemWriter<QueuedBatch<ListenerDeadLetter>> for ListenerLetterWriter {
    async fn write(&self, batches: Vec<QueuedBatch<ListenerDeadLetter>>) -> Result<()> {
        let batch = QueuedBatch::merge(batches);
        if batch.items.is_empty() {
            tracing::info!("No documents to save in this chunk");
            return Ok(());
        }

        let total = batch.items.len();
        match self.save_new(batch.items).await {
            Ok(saved) => {
                tracing::info!(
                    "Saved {} listener dead letters ({} duplicates skipped)",
                    saved,
                    total - saved
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to save listener dead letters: {}", e);
                roll_back(self.queue.as_ref(), &batch.messages).await;
                Err(e)
            }
        }
    }
}

pub fn listener_restore_from_redis_job(jobs: &DeadLetterJobs) -> Job {
    let letters = Arc::clone(&jobs.listener_letters);
    let queue = Arc::clone(&jobs.queue);
    let name = LISTENER_RESTORE_FROM_REDIS_JOB;

    Job::new(name).start(ChunkStep::new(step_name(name), 1, move |_params| {
        Ok(ChunkComponents::new(
            ActivityQueueReader::new(Arc::clone(&queue), PER_TYPE_BATCH),
            MessageRowProcessor {
                queue: Arc::clone(&queue),
                convert: ListenerDeadLetter::from_message,
            },
            ListenerLetterWriter {
                letters: Arc::clone(&letters),
                queue: Arc::clone(&queue),
            },
        ))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::activities::models::MemberActivityType;
    use crate::features::deadletters::jobs::test_support::{message, Fixture};
    use crate::features::deadletters::queue::activity_list_name;
    use crate::modules::batch::{BatchStatus, JobParameters};

    async fn park(fixture: &Fixture) {
        fixture
            .queue
            .push_back_all(&[
                message("a", MemberActivityType::PostCreate),
                message("b", MemberActivityType::PostCreate),
                message("c", MemberActivityType::CommentLikeCancel),
            ])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recovery_from_redis_stores_every_list() {
        let fixture = Fixture::new();
        park(&fixture).await;

        let execution = fixture
            .launcher()
            .run(KAFKA_FAILURE_RECOVERY_FROM_REDIS_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(execution.step_executions[0].read_count, 2);

        let rows = fixture.redis_letters.rows();
        assert_eq!(rows.len(), 3);
        let stored: MemberActivityMessage = serde_json::from_str(&rows[0].payload).unwrap();
        assert_eq!(stored.key, rows[0].message_key);
        assert!(fixture
            .queue
            .list(&activity_list_name(MemberActivityType::PostCreate))
            .is_empty());
    }

    #[tokio::test]
    async fn test_recovery_from_redis_rolls_back_on_insert_failure() {
        let fixture = Fixture::new();
        park(&fixture).await;
        fixture.redis_letters.fail_writes(true);

        let execution = fixture
            .launcher()
            .run(KAFKA_FAILURE_RECOVERY_FROM_REDIS_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Failed);
        // The first chunk failed and was returned; the second list was never read
        assert_eq!(
            fixture
                .queue
                .list(&activity_list_name(MemberActivityType::PostCreate))
                .len(),
            2
        );
        assert_eq!(
            fixture
                .queue
                .list(&activity_list_name(MemberActivityType::CommentLikeCancel))
                .len(),
            1
        );
        assert!(fixture.redis_letters.rows().is_empty());
    }

    #[tokio::test]
    async fn test_listener_restore_from_redis_skips_existing_keys() {
        let fixture = Fixture::new();
        fixture.listener_letters.seed(ListenerDeadLetter::new("a", "{}", None));
        park(&fixture).await;

        let execution = fixture
            .launcher()
            .run(LISTENER_RESTORE_FROM_REDIS_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Completed);
        let rows = fixture.listener_letters.rows();
        assert_eq!(rows.len(), 3);
        let b = rows.iter().find(|l| l.message_key == "b").unwrap();
        assert_eq!(
            b.published_at,
            Some(message("b", MemberActivityType::PostCreate).event.created_at.and_utc())
        );
    }

    #[tokio::test]
    async fn test_listener_restore_from_redis_rolls_back_on_insert_failure() {
        let fixture = Fixture::new();
        park(&fixture).await;
        fixture.listener_letters.fail_writes(true);

        let execution = fixture
            .launcher()
            .run(LISTENER_RESTORE_FROM_REDIS_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Failed);
        let keys: Vec<String> = fixture
            .queue
            .list(&activity_list_name(MemberActivityType::PostCreate))
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
