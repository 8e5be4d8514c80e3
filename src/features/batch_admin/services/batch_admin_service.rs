use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::modules::batch::{JobExecution, JobLauncher, JobParameters};

const DEFAULT_EXECUTION_LIMIT: i64 = 20;
const MAX_EXECUTION_LIMIT: i64 = 100;

/// Launching jobs and reading their execution history over HTTP
pub struct BatchAdminService {
    launcher: Arc<JobLauncher>,
}

impl BatchAdminService {
    pub fn new(launcher: Arc<JobLauncher>) -> Self {
        Self { launcher }
    }

    pub fn list_jobs(&self) -> Vec<String> {
        self.launcher.registry().names()
    }

    /// Start a job in the background and return its `STARTING` execution
    pub async fn launch(
        &self,
        job_name: &str,
        parameters: BTreeMap<String, String>,
    ) -> Result<JobExecution> {
        if let Some(key) = parameters.keys().find(|k| k.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "Job parameter key '{}' must not be blank",
                key
            )));
        }

        let execution = self
            .launcher
            .start(job_name, JobParameters::from(parameters))
            .await?;
        tracing::info!(
            "Launched {} as execution {} with parameters {}",
            job_name,
            execution.id,
            execution.parameters
        );
        Ok(execution)
    }

    pub async fn list_executions(
        &self,
        job_name: &str,
        limit: Option<i64>,
    ) -> Result<Vec<JobExecution>> {
        // Unknown names are a 404, not an empty history
        self.launcher.registry().get(job_name)?;

        let limit = limit
            .unwrap_or(DEFAULT_EXECUTION_LIMIT)
            .clamp(1, MAX_EXECUTION_LIMIT);
        self.launcher
            .repository()
            .list_executions(job_name, limit)
            .await
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<JobExecution> {
        self.launcher
            .repository()
            .get_execution(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job execution {} not found", id)))
    }
}
