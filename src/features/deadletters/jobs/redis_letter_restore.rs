use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::activities::mapper::{from_event, message_from_json};
use crate::features::activities::models::MemberActivity;
use crate::features::activities::MemberActivityStore;
use crate::features::deadletters::jobs::{
    lookback_cutoff, step_name, DeadLetterJobs, KAFKA_FAILURE_RECOVERY_FROM_MONGODB_JOB,
    STALE_DEAD_LETTER_CLEANUP_JOB,
};
use crate::features::deadletters::models::RedisDeadLetter;
use crate::features::deadletters::stores::RedisDeadLetterStore;
use crate::modules::batch::{
    ChunkComponents, ChunkStep, ItemProcessor, ItemReader, ItemWriter, Job, JobParameters,
};

const CHUNK_SIZE: usize = 10;
/// More unprocessed rows than this means something upstream is broken
const MAX_UNPROCESSED: usize = 100;
pub const STALE_HOURS_PARAM: &str = "staleHours";
const DEFAULT_STALE_HOURS: i64 = 5;

#[derive(Debug, Clone, Copy)]
enum Selection {
    Unprocessed,
    Stale { cutoff: DateTime<Utc> },
}

/// Loads its rows on the first read and hands them out one at a time
struct RedisLetterReader {
    store: Arc<dyn RedisDeadLetterStore>,
    selection: Selection,
    loaded: Option<VecDeque<RedisDeadLetter>>,
}

impl RedisLetterReader {
    fn new(store: Arc<dyn RedisDeadLetterStore>, selection: Selection) -> Self {
        Self {
            store,
            selection,
            loaded: None,
        }
    }

    async fn load(&self) -> Result<VecDeque<RedisDeadLetter>> {
        let letters = match self.selection {
            Selection::Unprocessed => {
                let letters = self.store.find_unprocessed().await?;
                if letters.len() > MAX_UNPROCESSED {
                    return Err(AppError::IllegalState(format!(
                        "{} unprocessed redis dead letters exceed the limit of {}",
                        letters.len(),
                        MAX_UNPROCESSED
                    )));
                }
                letters
            }
            Selection::Stale { cutoff } => {
                let letters = self.store.find_stale(cutoff).await?;
                tracing::info!(
                    "Found {} incomplete redis dead letters older than {}",
                    letters.len(),
                    cutoff
                );
                letters
            }
        };
        tracing::info!("Loaded {} redis dead letters", letters.len());
        Ok(letters.into())
    }
}

#[async_trait]
impl ItemReader<RedisDeadLetter> for RedisLetterReader {
    async fn read(&mut self) -> Result<Option<RedisDeadLetter>> {
        if self.loaded.is_none() {
            self.loaded = Some(self.load().await?);
        }
        Ok(self.loaded.as_mut().and_then(VecDeque::pop_front))
    }
}

struct RedisLetterDecoder;

#[async_trait]
impl ItemProcessor<RedisDeadLetter, (Uuid, MemberActivity)> for RedisLetterDecoder {
    async fn process(&self, letter: RedisDeadLetter) -> Result<Option<(Uuid, MemberActivity)>> {
        let decoded = message_from_json(&letter.payload)
            .and_then(|message| from_event(&message.event, None));
        match decoded {
            Ok(activity) => Ok(Some((letter.id, activity))),
            Err(e) => {
                tracing::error!(
                    "Error processing redis dead letter: id={}, messageKey={}, error={}",
                    letter.id,
                    letter.message_key,
                    e
                );
                Ok(None)
            }
        }
    }
}

struct RedisLetterRestoreWriter {
    activities: Arc<dyn MemberActivityStore>,
    letters: Arc<dyn RedisDeadLetterStore>,
}

#[async_trait]
impl ItemWriter<(Uuid, MemberActivity)> for RedisLetterRestoreWriter {
    async fn write(&self, items: Vec<(Uuid, MemberActivity)>) -> Result<()> {
        let (ids, activities): (Vec<Uuid>, Vec<MemberActivity>) = items.into_iter().unzip();

        self.activities.insert_all(&activities).await?;
        tracing::info!(
            "Saved {} member activities to member_activities",
            activities.len()
        );

        match self.letters.mark_completed(&ids).await {
            Ok(updated) => tracing::info!(
                "Updated {} redis_dead_letters rows to is_completed=true",
                updated
            ),
            Err(e) => tracing::error!("Failed to complete redis dead letters: {}", e),
        }
        Ok(())
    }
}

fn restore_job<F>(jobs: &DeadLetterJobs, name: &'static str, selection: F) -> Job
where
    F: Fn(&JobParameters) -> Result<Selection> + Send + Sync + 'static,
{
    let activities = Arc::clone(&jobs.activities);
    let letters = Arc::clone(&jobs.redis_letters);

    Job::new(name).start(ChunkStep::new(step_name(name), CHUNK_SIZE, move |params| {
        Ok(ChunkComponents::new(
            RedisLetterReader::new(Arc::clone(&letters), selection(params)?),
            RedisLetterDecoder,
            RedisLetterRestoreWriter {
                activities: Arc::clone(&activities),
                letters: Arc::clone(&letters),
            },
        ))
    }))
}

pub fn kafka_failure_recovery_from_mongodb_job(jobs: &DeadLetterJobs) -> Job {
    restore_job(jobs, KAFKA_FAILURE_RECOVERY_FROM_MONGODB_JOB, |_params| {
        Ok(Selection::Unprocessed)
    })
}

pub fn stale_dead_letter_cleanup_job(jobs: &DeadLetterJobs) -> Job {
    restore_job(jobs, STALE_DEAD_LETTER_CLEANUP_JOB, |params| {
        let cutoff = lookback_cutoff(
            params,
            STALE_HOURS_PARAM,
            DEFAULT_STALE_HOURS,
            Duration::try_hours,
            Utc::now(),
        )?;
        Ok(Selection::Stale { cutoff })
    })
}
