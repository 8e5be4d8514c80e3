use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::features::activities::dtos::MemberActivityMessage;
use crate::features::activities::mapper::{from_event, message_from_json};
use crate::features::activities::models::{ActivityGroup, MemberActivity};
use crate::features::activities::MemberActivityStore;
use crate::features::deadletters::jobs::categorized_restore::RestoredBatch;
use crate::features::deadletters::jobs::queue_parking::QueuedBatch;
use crate::features::deadletters::jobs::readers::{
    ListenerQueueReader, ListenerSource, PendingPageReader,
};
use crate::features::deadletters::jobs::{
    step_name, DeadLetterJobs, LISTENER_REDIS_DEADLETTER_RESTORE_JOB,
    LISTENER_RESTORE_FROM_MONGODB_JOB,
};
use crate::features::deadletters::models::ListenerDeadLetter;
use crate::features::deadletters::queue::ActivityDeadLetterQueue;
use crate::features::deadletters::stores::ListenerDeadLetterStore;
use crate::modules::batch::{
    ChunkComponents, ChunkStep, ItemProcessor, ItemWriter, Job, RequestedAtIncrementer,
};

const LISTENER_QUEUE_BATCH: usize = 50;
const LISTENER_PAGE_SIZE: i64 = 30;

struct ListenerMessageConverter;

#[async_trait]
impl ItemProcessor<Vec<MemberActivityMessage>, QueuedBatch<MemberActivity>>
    for ListenerMessageConverter
{
    async fn process(
        &self,
        messages: Vec<MemberActivityMessage>,
    ) -> Result<Option<QueuedBatch<MemberActivity>>> {
        let mut activities = Vec::with_capacity(messages.len());

        for message in &messages {
            let activity_type = message.event.member_activity_type;
            if activity_type.group() == ActivityGroup::Member {
                tracing::warn!("Unknown or unsupported activityType: {}", activity_type);
                continue;
            }
            match from_event(&message.event, Some(message.key.clone())) {
                Ok(activity) => activities.push(activity),
                Err(e) => tracing::error!(
                    "Error processing MemberActivityMessage: key={}, error={}",
                    message.key,
                    e
                ),
            }
        }

        tracing::info!(
            "Processed {} messages into {} member activities",
            messages.len(),
            activities.len()
        );
        if activities.is_empty() {
            return Ok(None);
        }
        Ok(Some(QueuedBatch {
            items: activities,
            messages,
        }))
    }
}

struct ListenerActivityWriter {
    activities: Arc<dyn MemberActivityStore>,
    queue: Arc<dyn ActivityDeadLetterQueue>,
}

#[async_trait]
impl ItemWriter<QueuedBatch<MemberActivity>> for ListenerActivityWriter {
    async fn write(&self, batches: Vec<QueuedBatch<MemberActivity>>) -> Result<()> {
        let batch = QueuedBatch::merge(batches);
        if batch.items.is_empty() {
            tracing::info!("No documents to save in this chunk");
            return Ok(());
        }

        if let Err(e) = self.activities.upsert_all(&batch.items).await {
            tracing::error!(
                "Failed to save member activities. Rolling back to Redis dead letter queue: {}",
                e
            );
            match self.queue.push_back_listener(&batch.messages).await {
                Ok(()) => tracing::info!(
                    "Rolled back {} messages to Redis dead letter queue",
                    batch.messages.len()
                ),
                Err(push_err) => tracing::error!(
                    "Failed to roll back {} messages to Redis: {}",
                    batch.messages.len(),
                    push_err
                ),
            }
            return Err(e);
        }

        tracing::info!(
            "Saved {} member activities to member_activities using upsert",
            batch.items.len()
        );
        Ok(())
    }
}

pub fn listener_redis_deadletter_restore_job(jobs: &DeadLetterJobs) -> Job {
    let activities = Arc::clone(&jobs.activities);
    let queue = Arc::clone(&jobs.queue);
    let name = LISTENER_REDIS_DEADLETTER_RESTORE_JOB;

    Job::new(name).start(ChunkStep::new(step_name(name), 1, move |_params| {
        Ok(ChunkComponents::new(
            ListenerQueueReader::new(Arc::clone(&queue), LISTENER_QUEUE_BATCH),
            ListenerMessageConverter,
            ListenerActivityWriter {
                activities: Arc::clone(&activities),
                queue: Arc::clone(&queue),
            },
        ))
    }))
}

struct ListenerLetterDecoder;

#[async_trait]
impl ItemProcessor<Vec<ListenerDeadLetter>, RestoredBatch> for ListenerLetterDecoder {
    async fn process(&self, letters: Vec<ListenerDeadLetter>) -> Result<Option<RestoredBatch>> {
        let mut batch = RestoredBatch::default();

        for letter in &letters {
            let decoded = message_from_json(&letter.payload)
                .and_then(|message| from_event(&message.event, Some(letter.message_key.clone())));
            match decoded {
                Ok(activity) => {
                    batch.activities.push(activity);
                    batch.completed_ids.push(letter.id);
                }
                Err(e) => tracing::error!(
                    "Error processing listener dead letter: messageKey={}, error={}",
                    letter.message_key,
                    e
                ),
            }
        }

        tracing::info!(
            "Processed {} listener dead letters into {} member activities",
            letters.len(),
            batch.activities.len()
        );
        Ok((!batch.activities.is_empty()).then_some(batch))
    }
}

/// Inserts activities whose message key is not yet recorded
struct NewActivityWriter {
    activities: Arc<dyn MemberActivityStore>,
    letters: Arc<dyn ListenerDeadLetterStore>,
}

#[async_trait]
impl ItemWriter<RestoredBatch> for NewActivityWriter {
    async fn write(&self, batches: Vec<RestoredBatch>) -> Result<()> {
        let mut activities = Vec::new();
        let mut completed_ids = Vec::new();
        for batch in batches {
            activities.extend(batch.activities);
            completed_ids.extend(batch.completed_ids);
        }
        if activities.is_empty() {
            tracing::info!("No documents to save in this chunk");
            return Ok(());
        }

        let keys: Vec<String> = activities
            .iter()
            .filter_map(|a| a.message_key.clone())
            .collect();
        let existing = self.activities.find_existing_message_keys(&keys).await?;
        tracing::info!(
            "Found {} existing messageKeys in member_activities",
            existing.len()
        );

        let fresh: Vec<MemberActivity> = activities
            .into_iter()
            .filter(|a| {
                a.message_key
                    .as_ref()
                    .map_or(true, |key| !existing.contains(key))
            })
            .collect();
        if !fresh.is_empty() {
            self.activities.insert_all(&fresh).await?;
            tracing::info!(
                "Saved {} member activities to member_activities",
                fresh.len()
            );
        }

        match self.letters.mark_completed(&completed_ids).await {
            Ok(updated) => tracing::info!(
                "Updated {} listener_dead_letters rows to is_completed=true",
                updated
            ),
            Err(e) => tracing::error!("Failed to complete listener dead letters: {}", e),
        }
        Ok(())
    }
}

pub fn listener_restore_from_mongodb_job(jobs: &DeadLetterJobs) -> Job {
    let activities = Arc::clone(&jobs.activities);
    let letters = Arc::clone(&jobs.listener_letters);
    let name = LISTENER_RESTORE_FROM_MONGODB_JOB;

    Job::new(name)
        .incrementer(RequestedAtIncrementer)
        .start(ChunkStep::new(step_name(name), 1, move |_params| {
            Ok(ChunkComponents::new(
                PendingPageReader::new(
                    ListenerSource {
                        store: Arc::clone(&letters),
                    },
                    LISTENER_PAGE_SIZE,
                ),
                ListenerLetterDecoder,
                NewActivityWriter {
                    activities: Arc::clone(&activities),
                    letters: Arc::clone(&letters),
                },
            ))
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::activities::models::MemberActivityType;
    use crate::features::deadletters::jobs::test_support::{message, message_json, Fixture};
    use crate::features::deadletters::queue::listener_list_name;
    use crate::modules::batch::parameters::REQUESTED_AT;
    use crate::modules::batch::{BatchStatus, JobParameters};

    fn listener_messages() -> Vec<MemberActivityMessage> {
        vec![
            message("k1", MemberActivityType::PostCreate),
            message("k2", MemberActivityType::MemberFollow),
            message("k3", MemberActivityType::CommentCreate),
        ]
    }

    #[tokio::test]
    async fn test_listener_redis_restore_upserts_supported_types() {
        let fixture = Fixture::new();
        fixture
            .queue
            .push_back_listener(&listener_messages())
            .await
            .unwrap();

        let execution = fixture
            .launcher()
            .run(LISTENER_REDIS_DEADLETTER_RESTORE_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Completed);
        let mut keys: Vec<String> = fixture
            .activities
            .rows()
            .into_iter()
            .filter_map(|a| a.message_key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["k1", "k3"]);
        assert!(fixture.queue.list(listener_list_name()).is_empty());
    }

    #[tokio::test]
    async fn test_listener_redis_restore_pushes_back_on_write_failure() {
        let fixture = Fixture::new();
        fixture
            .queue
            .push_back_listener(&listener_messages())
            .await
            .unwrap();
        fixture.activities.fail_writes(true);

        let execution = fixture
            .launcher()
            .run(LISTENER_REDIS_DEADLETTER_RESTORE_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Failed);
        let restored: Vec<String> = fixture
            .queue
            .list(listener_list_name())
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(restored, vec!["k1", "k2", "k3"]);
    }

    #[tokio::test]
    async fn test_listener_restore_from_db_skips_known_keys() {
        let fixture = Fixture::new();
        fixture.activities.seed(MemberActivity::post(
            10,
            20,
            MemberActivityType::PostCreate,
            Some("known".to_string()),
        ));
        let known = ListenerDeadLetter::new(
            "known",
            message_json("known", MemberActivityType::PostCreate),
            None,
        );
        let fresh = ListenerDeadLetter::new(
            "fresh",
            message_json("fresh", MemberActivityType::CommentLike),
            None,
        );
        let garbage = ListenerDeadLetter::new("garbage", "not json", None);
        for letter in [&known, &fresh, &garbage] {
            fixture.listener_letters.seed(letter.clone());
        }

        let execution = fixture
            .launcher()
            .run(LISTENER_RESTORE_FROM_MONGODB_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Completed);
        assert!(execution.parameters.contains(REQUESTED_AT));

        let rows = fixture.activities.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .any(|a| a.message_key.as_deref() == Some("fresh") && a.comment_id == Some(30)));

        for letter in fixture.listener_letters.rows() {
            assert_eq!(letter.is_completed, letter.id != garbage.id);
        }
    }

    #[tokio::test]
    async fn test_listener_restore_from_db_can_run_repeatedly() {
        let fixture = Fixture::new();
        let launcher = fixture.launcher();

        let first = launcher
            .run(LISTENER_RESTORE_FROM_MONGODB_JOB, JobParameters::new())
            .await
            .unwrap();
        let second = launcher
            .run(LISTENER_RESTORE_FROM_MONGODB_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(first.status, BatchStatus::Completed);
        assert_eq!(second.status, BatchStatus::Completed);
        assert_ne!(first.job_key, second.job_key);
    }
}
