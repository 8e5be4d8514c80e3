//! Restore jobs moving parked activity messages back into
//! `member_activities`, plus the housekeeping around them.

mod categorized_restore;
mod failure_files;
mod listener_restore;
mod queue_parking;
pub mod readers;
mod redis_letter_restore;
#[cfg(test)]
pub(crate) mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::core::error::{AppError, Result};
use crate::features::activities::MemberActivityStore;
use crate::features::deadletters::queue::ActivityDeadLetterQueue;
use crate::features::deadletters::stores::{
    CategorizedDeadLetterStore, ListenerDeadLetterStore, RedisDeadLetterStore,
};
use crate::modules::batch::{Job, JobParameters};

pub const PUBLISH_DEADLETTER_RESTORE_JOB: &str = "publishDeadletterRestoreJob";
pub const FEIGN_DEADLETTER_RESTORE_JOB: &str = "feignDeadletterRestoreJob";
pub const LISTENER_DEADLETTER_RESTORE_JOB: &str = "listenerDeadletterRestoreJob";
pub const LISTENER_REDIS_DEADLETTER_RESTORE_JOB: &str = "listenerRedisDeadletterRestoreJob";
pub const KAFKA_FAILURE_RECOVERY_FROM_REDIS_JOB: &str = "activityKafkaFailureRecoveryFromRedisJob";
pub const KAFKA_FAILURE_RECOVERY_FROM_MONGODB_JOB: &str =
    "activityKafkaFailureRecoveryFromMongoDBJob";
pub const STALE_DEAD_LETTER_CLEANUP_JOB: &str = "activityStaleDeadLetterCleanupJob";
pub const LISTENER_RESTORE_FROM_REDIS_JOB: &str = "activityListenerRestoreFromRedisJob";
pub const LISTENER_RESTORE_FROM_MONGODB_JOB: &str = "activityListenerRestoreFromMongoDBJob";
pub const LISTENER_RESTORE_FROM_FILE_JOB: &str = "activityListenerRestoreFromFileJob";
pub const COMPLETED_FILE_CLEANUP_JOB: &str = "activityCompletedFileCleanupJob";

/// Job parameter overriding the directory of the file jobs
pub const FAILURE_PATH_PARAM: &str = "failurePath";

/// `fooJob` runs its single step `fooStep`
pub fn step_name(job_name: &str) -> String {
    format!("{}Step", job_name.strip_suffix("Job").unwrap_or(job_name))
}

/// `now` minus the span given by the integer parameter `key` (or `default`).
/// Negative values and spans chrono cannot represent are rejected.
pub(crate) fn lookback_cutoff(
    params: &JobParameters,
    key: &str,
    default: i64,
    span: fn(i64) -> Option<Duration>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let value = params.get_parsed::<i64>(key)?.unwrap_or(default);
    if value < 0 {
        return Err(AppError::Validation(format!(
            "Job parameter '{}' must not be negative, got {}",
            key, value
        )));
    }
    span(value)
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Job parameter '{}' is out of range, got {}",
                key, value
            ))
        })
}

/// Everything the dead-letter jobs read from and write to
#[derive(Clone)]
pub struct DeadLetterJobs {
    pub activities: Arc<dyn MemberActivityStore>,
    pub categorized: Arc<dyn CategorizedDeadLetterStore>,
    pub listener_letters: Arc<dyn ListenerDeadLetterStore>,
    pub redis_letters: Arc<dyn RedisDeadLetterStore>,
    pub queue: Arc<dyn ActivityDeadLetterQueue>,
    /// Default directory of `activityListenerRestoreFromFileJob`
    pub listener_file_path: PathBuf,
    /// Default directory of `activityCompletedFileCleanupJob`
    pub failure_path: PathBuf,
}

impl DeadLetterJobs {
    pub fn into_jobs(self) -> Vec<Job> {
        vec![
            categorized_restore::publish_deadletter_restore_job(&self),
            categorized_restore::feign_deadletter_restore_job(&self),
            categorized_restore::listener_deadletter_restore_job(&self),
            listener_restore::listener_redis_deadletter_restore_job(&self),
            queue_parking::kafka_failure_recovery_from_redis_job(&self),
            redis_letter_restore::kafka_failure_recovery_from_mongodb_job(&self),
            redis_letter_restore::stale_dead_letter_cleanup_job(&self),
            queue_parking::listener_restore_from_redis_job(&self),
            listener_restore::listener_restore_from_mongodb_job(&self),
            failure_files::listener_restore_from_file_job(&self),
            failure_files::completed_file_cleanup_job(&self),
        ]
    }
}
