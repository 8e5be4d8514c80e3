use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::activities::dtos::ActivityRequest;
use crate::features::activities::models::MemberActivity;
use crate::features::activities::MemberActivityStore;
use crate::features::deadletters::jobs::readers::{CategorizedSource, PendingPageReader};
use crate::features::deadletters::jobs::{
    step_name, DeadLetterJobs, FEIGN_DEADLETTER_RESTORE_JOB, LISTENER_DEADLETTER_RESTORE_JOB,
    PUBLISH_DEADLETTER_RESTORE_JOB,
};
use crate::features::deadletters::models::{CategorizedDeadLetter, DeadLetterSource};
use crate::features::deadletters::stores::CategorizedDeadLetterStore;
use crate::modules::batch::{ChunkComponents, ChunkStep, ItemProcessor, ItemWriter, Job};

const PAGE_SIZE: i64 = 50;

/// Activities decoded from one page, with the ids of the rows they came from
#[derive(Debug, Default)]
pub(super) struct RestoredBatch {
    pub activities: Vec<MemberActivity>,
    pub completed_ids: Vec<Uuid>,
}

impl RestoredBatch {
    fn merge(batches: Vec<RestoredBatch>) -> RestoredBatch {
        batches
            .into_iter()
            .fold(RestoredBatch::default(), |mut all, batch| {
                all.activities.extend(batch.activities);
                all.completed_ids.extend(batch.completed_ids);
                all
            })
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Insert,
    /// Replace activities with the same message key
    Upsert,
}

struct CategorizedDecoder {
    source: DeadLetterSource,
    keep_message_key: bool,
}

#[async_trait]
impl ItemProcessor<Vec<CategorizedDeadLetter>, RestoredBatch> for CategorizedDecoder {
    async fn process(&self, letters: Vec<CategorizedDeadLetter>) -> Result<Option<RestoredBatch>> {
        let mut batch = RestoredBatch::default();

        for letter in &letters {
            match ActivityRequest::decode(letter.category, &letter.payload) {
                Ok(request) => {
                    let key = if self.keep_message_key {
                        letter.message_key.clone()
                    } else {
                        None
                    };
                    batch.activities.push(request.into_activity(key));
                    batch.completed_ids.push(letter.id);
                }
                Err(e) => {
                    tracing::error!(
                        "Error processing {} row: id={}, category={:?}, error={}",
                        self.source.table(),
                        letter.id,
                        letter.category,
                        e
                    );
                }
            }
        }

        tracing::info!(
            "Processed {} {} rows into {} member activities",
            letters.len(),
            self.source.table(),
            batch.activities.len()
        );
        Ok((!batch.activities.is_empty()).then_some(batch))
    }
}

struct CategorizedRestoreWriter {
    activities: Arc<dyn MemberActivityStore>,
    letters: Arc<dyn CategorizedDeadLetterStore>,
    source: DeadLetterSource,
    mode: WriteMode,
}

#[async_trait]
impl ItemWriter<RestoredBatch> for CategorizedRestoreWriter {
    async fn write(&self, batches: Vec<RestoredBatch>) -> Result<()> {
        let batch = RestoredBatch::merge(batches);
        if batch.activities.is_empty() {
            tracing::info!("No documents to save in this chunk");
            return Ok(());
        }

        let saved = match self.mode {
            WriteMode::Insert => self.activities.insert_all(&batch.activities).await,
            WriteMode::Upsert => self.activities.upsert_all(&batch.activities).await,
        };
        if let Err(e) = saved {
            tracing::error!("Failed to save member activities, rolling back chunk: {}", e);
            return Err(e);
        }
        tracing::info!(
            "Saved {} member activities to member_activities",
            batch.activities.len()
        );

        // Activities are already committed; a row left pending is restored again
        match self
            .letters
            .mark_completed(self.source, &batch.completed_ids)
            .await
        {
            Ok(updated) => tracing::info!(
                "Updated {} {} rows to is_completed=true",
                updated,
                self.source.table()
            ),
            Err(e) => tracing::error!(
                "Failed to update is_completed of {} rows: {}",
                self.source.table(),
                e
            ),
        }
        Ok(())
    }
}

fn categorized_restore_job(
    job_name: &str,
    jobs: &DeadLetterJobs,
    source: DeadLetterSource,
    keep_message_key: bool,
    mode: WriteMode,
) -> Job {
    let activities = Arc::clone(&jobs.activities);
    let letters = Arc::clone(&jobs.categorized);

    Job::new(job_name).start(ChunkStep::new(step_name(job_name), 1, move |_params| {
        Ok(ChunkComponents::new(
            PendingPageReader::new(
                CategorizedSource {
                    store: Arc::clone(&letters),
                    source,
                },
                PAGE_SIZE,
            ),
            CategorizedDecoder {
                source,
                keep_message_key,
            },
            CategorizedRestoreWriter {
                activities: Arc::clone(&activities),
                letters: Arc::clone(&letters),
                source,
                mode,
            },
        ))
    }))
}

pub fn publish_deadletter_restore_job(jobs: &DeadLetterJobs) -> Job {
    categorized_restore_job(
        PUBLISH_DEADLETTER_RESTORE_JOB,
        jobs,
        DeadLetterSource::KafkaPublisher,
        false,
        WriteMode::Insert,
    )
}

pub fn feign_deadletter_restore_job(jobs: &DeadLetterJobs) -> Job {
    categorized_restore_job(
        FEIGN_DEADLETTER_RESTORE_JOB,
        jobs,
        DeadLetterSource::Feign,
        false,
        WriteMode::Insert,
    )
}

pub fn listener_deadletter_restore_job(jobs: &DeadLetterJobs) -> Job {
    categorized_restore_job(
        LISTENER_DEADLETTER_RESTORE_JOB,
        jobs,
        DeadLetterSource::KafkaListener,
        true,
        WriteMode::Upsert,
    )
}
