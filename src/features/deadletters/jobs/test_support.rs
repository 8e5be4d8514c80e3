use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::features::activities::dtos::{MemberActivityEvent, MemberActivityMessage};
use crate::features::activities::models::{ActivityGroup, MemberActivityType};
use crate::features::activities::stores::InMemoryMemberActivityStore;
use crate::features::deadletters::jobs::DeadLetterJobs;
use crate::features::deadletters::queue::InMemoryActivityDeadLetterQueue;
use crate::features::deadletters::stores::{
    InMemoryCategorizedDeadLetterStore, InMemoryListenerDeadLetterStore,
    InMemoryRedisDeadLetterStore,
};
use crate::modules::batch::repository::InMemoryJobRepository;
use crate::modules::batch::{JobLauncher, JobRegistry};

/// Message carrying exactly the ids its type needs
pub fn message(key: &str, activity_type: MemberActivityType) -> MemberActivityMessage {
    let (post_id, comment_id) = match activity_type.group() {
        ActivityGroup::Post | ActivityGroup::PostLike => (Some(20), None),
        ActivityGroup::Comment => (Some(20), Some(30)),
        ActivityGroup::CommentLike => (None, Some(30)),
        ActivityGroup::Member => (None, None),
    };
    MemberActivityMessage {
        key: key.to_string(),
        event: MemberActivityEvent {
            member_id: 10,
            post_id,
            comment_id,
            member_activity_type: activity_type,
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        },
    }
}

pub fn message_json(key: &str, activity_type: MemberActivityType) -> String {
    serde_json::to_string(&message(key, activity_type)).unwrap()
}

pub struct Fixture {
    pub activities: Arc<InMemoryMemberActivityStore>,
    pub categorized: Arc<InMemoryCategorizedDeadLetterStore>,
    pub listener_letters: Arc<InMemoryListenerDeadLetterStore>,
    pub redis_letters: Arc<InMemoryRedisDeadLetterStore>,
    pub queue: Arc<InMemoryActivityDeadLetterQueue>,
    pub listener_dir: TempDir,
    pub failure_dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            activities: Arc::new(InMemoryMemberActivityStore::new()),
            categorized: Arc::new(InMemoryCategorizedDeadLetterStore::new()),
            listener_letters: Arc::new(InMemoryListenerDeadLetterStore::new()),
            redis_letters: Arc::new(InMemoryRedisDeadLetterStore::new()),
            queue: Arc::new(InMemoryActivityDeadLetterQueue::new()),
            listener_dir: TempDir::new().unwrap(),
            failure_dir: TempDir::new().unwrap(),
        }
    }

    pub fn jobs(&self) -> DeadLetterJobs {
        DeadLetterJobs {
            activities: self.activities.clone(),
            categorized: self.categorized.clone(),
            listener_letters: self.listener_letters.clone(),
            redis_letters: self.redis_letters.clone(),
            queue: self.queue.clone(),
            listener_file_path: self.listener_dir.path().to_path_buf(),
            failure_path: self.failure_dir.path().to_path_buf(),
        }
    }

    pub fn launcher(&self) -> JobLauncher {
        let mut registry = JobRegistry::new();
        for job in self.jobs().into_jobs() {
            registry.register(job).unwrap();
        }
        JobLauncher::new(
            Arc::new(registry),
            Arc::new(InMemoryJobRepository::new()),
            4,
        )
    }
}
