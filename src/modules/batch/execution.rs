use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::modules::batch::parameters::JobParameters;

/// Lifecycle status of a job or step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "batch_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Starting,
    Started,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, BatchStatus::Starting | BatchStatus::Started)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and outcome of one step run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    pub step_name: String,
    pub status: BatchStatus,
    pub read_count: u64,
    pub filter_count: u64,
    pub write_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}

impl StepExecution {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: BatchStatus::Started,
            read_count: 0,
            filter_count: 0,
            write_count: 0,
            commit_count: 0,
            rollback_count: 0,
            started_at: Utc::now(),
            ended_at: None,
            failure: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = BatchStatus::Completed;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, failure: impl Into<String>) {
        self.status = BatchStatus::Failed;
        self.failure = Some(failure.into());
        self.ended_at = Some(Utc::now());
    }
}

/// One run of a job instance
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    /// Identity of the job instance (canonical parameter string)
    pub job_key: String,
    #[schema(value_type = Object)]
    pub parameters: JobParameters,
    pub status: BatchStatus,
    pub exit_code: String,
    pub step_executions: Vec<StepExecution>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl JobExecution {
    pub fn new(job_name: impl Into<String>, parameters: JobParameters) -> Self {
        let status = BatchStatus::Starting;
        Self {
            id: Uuid::now_v7(),
            job_name: job_name.into(),
            job_key: parameters.identity_key(),
            parameters,
            status,
            exit_code: status.to_string(),
            step_executions: Vec::new(),
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.set_status(BatchStatus::Started);
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.set_status(BatchStatus::Completed);
        self.ended_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, failure: impl Into<String>) {
        self.set_status(BatchStatus::Failed);
        self.failure = Some(failure.into());
        self.ended_at = Some(Utc::now());
    }

    pub fn step(&self, step_name: &str) -> Option<&StepExecution> {
        self.step_executions
            .iter()
            .find(|s| s.step_name == step_name)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    fn set_status(&mut self, status: BatchStatus) {
        self.status = status;
        self.exit_code = status.to_string();
    }
}
