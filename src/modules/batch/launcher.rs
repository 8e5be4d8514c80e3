use std::any::Any;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::core::error::{AppError, Result};
use crate::modules::batch::execution::{BatchStatus, JobExecution, StepExecution};
use crate::modules::batch::job::{Job, JobRegistry};
use crate::modules::batch::parameters::JobParameters;
use crate::modules::batch::repository::JobRepository;
use crate::modules::batch::step::Step;

/// Resolves jobs by name and runs them, recording every execution.
///
/// At most `max_concurrent_jobs` executions run at once; further launches
/// wait for a permit.
pub struct JobLauncher {
    registry: Arc<JobRegistry>,
    repository: Arc<dyn JobRepository>,
    permits: Arc<Semaphore>,
}

impl JobLauncher {
    pub fn new(
        registry: Arc<JobRegistry>,
        repository: Arc<dyn JobRepository>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            registry,
            repository,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    /// Run a job to completion.
    ///
    /// A failing step yields `Ok` with a `FAILED` execution. `Err` means the
    /// job could not be launched at all.
    pub async fn run(&self, job_name: &str, params: JobParameters) -> Result<JobExecution> {
        let (job, execution) = self.prepare(job_name, params).await?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::Internal("Job launcher is closed".to_string()))?;

        Ok(execute(job, self.repository.as_ref(), execution).await)
    }

    /// Launch a job in the background and return its `STARTING` execution
    pub async fn start(&self, job_name: &str, params: JobParameters) -> Result<JobExecution> {
        let (job, execution) = self.prepare(job_name, params).await?;
        let snapshot = execution.clone();

        let repository = Arc::clone(&self.repository);
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!("Job launcher closed before {} could start", job.name());
                    return;
                }
            };
            execute(job, repository.as_ref(), execution).await;
        });

        Ok(snapshot)
    }

    async fn prepare(&self, job_name: &str, params: JobParameters) -> Result<(Arc<Job>, JobExecution)> {
        let job = self.registry.get(job_name)?;
        let params = job.prepare_parameters(params);
        let execution = self.repository.create_execution(job.name(), &params).await?;
        Ok((job, execution))
    }
}

async fn persist(repository: &dyn JobRepository, execution: &JobExecution) {
    if let Err(e) = repository.update_execution(execution).await {
        tracing::error!(
            "Failed to record state {} of job execution {}: {}",
            execution.status,
            execution.id,
            e
        );
    }
}

/// Run one step on its own task so a panic ends as a step failure instead
/// of leaving the execution `STARTED`
async fn run_step(step: Arc<dyn Step>, params: JobParameters) -> (StepExecution, Result<()>) {
    let name = step.name().to_string();
    let handle = tokio::spawn(async move {
        let mut step_execution = StepExecution::new(step.name());
        let result = step.execute(&params, &mut step_execution).await;
        (step_execution, result)
    });

    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            let reason = if e.is_panic() {
                format!("Step {} panicked: {}", name, panic_message(e.into_panic()))
            } else {
                format!("Step {} was cancelled", name)
            };
            (StepExecution::new(name), Err(AppError::Internal(reason)))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn execute(
    job: Arc<Job>,
    repository: &dyn JobRepository,
    mut execution: JobExecution,
) -> JobExecution {
    execution.mark_started();
    persist(repository, &execution).await;

    tracing::info!(
        "Job: [{}] launched with the following parameters: [{}]",
        job.name(),
        execution.parameters
    );

    for step in job.steps() {
        tracing::info!("Executing step: [{}]", step.name());
        let (mut step_execution, result) =
            run_step(Arc::clone(step), execution.parameters.clone()).await;

        match result {
            Ok(()) => {
                step_execution.complete();
                tracing::info!(
                    "Step: [{}] executed (read={}, filtered={}, written={}, commits={})",
                    step_execution.step_name,
                    step_execution.read_count,
                    step_execution.filter_count,
                    step_execution.write_count,
                    step_execution.commit_count
                );
                execution.step_executions.push(step_execution);
                persist(repository, &execution).await;
            }
            Err(e) => {
                tracing::error!(
                    "Encountered an error executing step {} in job {}: {}",
                    step.name(),
                    job.name(),
                    e
                );
                step_execution.fail(e.to_string());
                execution.step_executions.push(step_execution);
                execution.mark_failed(e.to_string());
                break;
            }
        }
    }

    if execution.status != BatchStatus::Failed {
        execution.mark_completed();
    }
    persist(repository, &execution).await;

    tracing::info!(
        "Job: [{}] completed with the following parameters: [{}] and the following status: [{}] in {}ms",
        job.name(),
        execution.parameters,
        execution.status,
        execution.duration_ms().unwrap_or_default()
    );

    execution
}
