use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::features::tokens::services::TokenCleanupService;
use crate::modules::batch::{Job, JobParameters, Tasklet, TaskletStep};

pub const TOKEN_CLEANUP_JOB: &str = "tokenCleanupJob";
pub const TOKEN_CLEANUP_STEP: &str = "tokenCleanupStep";

struct TokenCleanupTasklet {
    service: Arc<TokenCleanupService>,
}

#[async_trait]
impl Tasklet for TokenCleanupTasklet {
    async fn execute(&self, _params: &JobParameters) -> Result<()> {
        self.service.cleanup_expired_tokens().await.map(|_| ())
    }
}

pub fn token_cleanup_job(service: Arc<TokenCleanupService>) -> Job {
    Job::new(TOKEN_CLEANUP_JOB).start(TaskletStep::new(
        TOKEN_CLEANUP_STEP,
        Arc::new(TokenCleanupTasklet { service }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tokens::stores::{InMemoryRefreshTokenStore, InMemoryTokenBlacklistStore};
    use crate::modules::batch::repository::InMemoryJobRepository;
    use crate::modules::batch::{BatchStatus, JobLauncher, JobRegistry};

    fn launcher(refresh: Arc<InMemoryRefreshTokenStore>) -> JobLauncher {
        let service = Arc::new(TokenCleanupService::new(
            refresh,
            Arc::new(InMemoryTokenBlacklistStore::default()),
        ));
        let mut registry = JobRegistry::new();
        registry.register(token_cleanup_job(service)).unwrap();
        JobLauncher::new(
            Arc::new(registry),
            Arc::new(InMemoryJobRepository::new()),
            1,
        )
    }

    #[tokio::test]
    async fn test_token_cleanup_job_completes() {
        let execution = launcher(Arc::new(InMemoryRefreshTokenStore::default()))
            .run(TOKEN_CLEANUP_JOB, JobParameters::new().with("time", "1"))
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(execution.step_executions[0].step_name, TOKEN_CLEANUP_STEP);
        assert_eq!(execution.step_executions[0].commit_count, 1);
    }

    #[tokio::test]
    async fn test_token_cleanup_job_fails_on_store_error() {
        let refresh = Arc::new(InMemoryRefreshTokenStore::default());
        refresh.fail_reads(true);

        let execution = launcher(refresh)
            .run(TOKEN_CLEANUP_JOB, JobParameters::new())
            .await
            .unwrap();

        assert_eq!(execution.status, BatchStatus::Failed);
        assert!(execution
            .failure
            .unwrap()
            .contains("jwt_refresh_tokens unavailable"));
    }
}
