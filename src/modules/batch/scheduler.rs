use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::config::ScheduleConfig;
use crate::core::error::Result;
use crate::modules::batch::execution::BatchStatus;
use crate::modules::batch::launcher::JobLauncher;
use crate::modules::batch::parameters::JobParameters;

/// Parameter carrying the launch time in epoch milliseconds
pub const TIME_PARAMETER: &str = "time";

/// Launches configured jobs at a fixed rate.
///
/// Each tick runs the job with a fresh `time` parameter so every run is a
/// new instance. A tick that falls due while the previous run is still in
/// progress is skipped.
pub struct JobScheduler {
    launcher: Arc<JobLauncher>,
    schedules: Vec<ScheduleConfig>,
}

impl JobScheduler {
    pub fn new(launcher: Arc<JobLauncher>, schedules: Vec<ScheduleConfig>) -> Self {
        Self {
            launcher,
            schedules,
        }
    }

    /// Spawn one task per schedule. Fails if a schedule names an unknown job.
    pub fn spawn(self) -> Result<Vec<JoinHandle<()>>> {
        for schedule in &self.schedules {
            self.launcher.registry().get(&schedule.job_name)?;
        }

        Ok(self
            .schedules
            .into_iter()
            .map(|schedule| {
                tracing::info!(
                    "Scheduling {} every {}s",
                    schedule.job_name,
                    schedule.interval.as_secs()
                );
                tokio::spawn(run_schedule(Arc::clone(&self.launcher), schedule))
            })
            .collect())
    }
}

async fn run_schedule(launcher: Arc<JobLauncher>, schedule: ScheduleConfig) {
    let mut ticker = interval(schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let params = JobParameters::new().with(
            TIME_PARAMETER,
            chrono::Utc::now().timestamp_millis().to_string(),
        );

        match launcher.run(&schedule.job_name, params).await {
            Ok(execution) if execution.status == BatchStatus::Failed => {
                tracing::warn!(
                    "Scheduled job {} failed: {}",
                    schedule.job_name,
                    execution.failure.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(execution) => {
                tracing::debug!(
                    "Scheduled job {} finished with {}",
                    schedule.job_name,
                    execution.exit_code
                );
            }
            Err(e) => {
                tracing::error!("Failed to launch scheduled job {}: {}", schedule.job_name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use crate::modules::batch::job::{Job, JobRegistry};
    use crate::modules::batch::repository::InMemoryJobRepository;
    use crate::modules::batch::step::{Tasklet, TaskletStep};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Noop;

    #[async_trait]
    impl Tasklet for Noop {
        async fn execute(&self, _params: &JobParameters) -> Result<()> {
            Ok(())
        }
    }

    fn launcher(repository: Arc<InMemoryJobRepository>) -> Arc<JobLauncher> {
        let mut registry = JobRegistry::new();
        registry
            .register(Job::new("tickJob").start(TaskletStep::new("tickStep", Arc::new(Noop))))
            .unwrap();
        Arc::new(JobLauncher::new(Arc::new(registry), repository, 1))
    }

    #[tokio::test]
    async fn test_spawn_rejects_unknown_job() {
        let scheduler = JobScheduler::new(
            launcher(Arc::new(InMemoryJobRepository::new())),
            vec![ScheduleConfig {
                job_name: "missingJob".to_string(),
                interval: Duration::from_secs(60),
            }],
        );

        assert!(matches!(scheduler.spawn(), Err(AppError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_schedule_launches_with_time_parameter() {
        let repository = Arc::new(InMemoryJobRepository::new());
        let scheduler = JobScheduler::new(
            launcher(repository.clone()),
            vec![ScheduleConfig {
                job_name: "tickJob".to_string(),
                interval: Duration::from_millis(40),
            }],
        );

        let handles = scheduler.spawn().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        for handle in handles {
            handle.abort();
        }

        let executions = repository.all();
        assert!(executions.len() >= 2);
        assert!(executions
            .iter()
            .all(|e| e.parameters.get(TIME_PARAMETER).is_some()));
        assert!(executions
            .iter()
            .any(|e| e.status == BatchStatus::Completed));
    }
}
