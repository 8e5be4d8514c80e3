use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::modules::batch::execution::{BatchStatus, JobExecution, StepExecution};
use crate::modules::batch::parameters::JobParameters;

/// Persistence of job executions.
///
/// `create_execution` is where job instance identity is enforced: a
/// completed instance cannot run again and a running one cannot be started
/// twice. Failed instances may be restarted.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create_execution(&self, job_name: &str, params: &JobParameters)
        -> Result<JobExecution>;

    async fn update_execution(&self, execution: &JobExecution) -> Result<()>;

    async fn get_execution(&self, id: Uuid) -> Result<Option<JobExecution>>;

    /// Most recent first
    async fn list_executions(&self, job_name: &str, limit: i64) -> Result<Vec<JobExecution>>;
}

fn check_previous(job_name: &str, job_key: &str, previous: Option<BatchStatus>) -> Result<()> {
    match previous {
        Some(BatchStatus::Completed) => Err(AppError::JobInstanceAlreadyComplete {
            job_name: job_name.to_string(),
            job_key: job_key.to_string(),
        }),
        Some(status) if status.is_running() => Err(AppError::JobExecutionAlreadyRunning {
            job_name: job_name.to_string(),
            job_key: job_key.to_string(),
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, FromRow)]
struct JobExecutionRow {
    id: Uuid,
    job_name: String,
    job_key: String,
    parameters: Json<JobParameters>,
    status: BatchStatus,
    exit_code: String,
    step_executions: Json<Vec<StepExecution>>,
    failure: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl From<JobExecutionRow> for JobExecution {
    fn from(row: JobExecutionRow) -> Self {
        Self {
            id: row.id,
            job_name: row.job_name,
            job_key: row.job_key,
            parameters: row.parameters.0,
            status: row.status,
            exit_code: row.exit_code,
            step_executions: row.step_executions.0,
            failure: row.failure,
            created_at: row.created_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
        }
    }
}

const SELECT_EXECUTION: &str = r#"
    SELECT id, job_name, job_key, parameters, status, exit_code,
           step_executions, failure, created_at, started_at, ended_at
    FROM batch_job_executions
"#;

/// Job repository backed by the `batch_job_executions` table
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create_execution(
        &self,
        job_name: &str,
        params: &JobParameters,
    ) -> Result<JobExecution> {
        let execution = JobExecution::new(job_name, params.clone());

        let mut tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to begin job execution transaction: {:?}", e);
            AppError::Database(e)
        })?;

        // Serialize launches of the same instance until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", job_name, execution.job_key))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to lock job instance {}: {:?}", job_name, e);
                AppError::Database(e)
            })?;

        let previous = sqlx::query_scalar::<_, BatchStatus>(
            r#"
            SELECT status
            FROM batch_job_executions
            WHERE job_name = $1 AND job_key = $2 AND status <> 'failed'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(job_name)
        .bind(&execution.job_key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up job instance {}: {:?}", job_name, e);
            AppError::Database(e)
        })?;

        check_previous(job_name, &execution.job_key, previous)?;

        sqlx::query(
            r#"
            INSERT INTO batch_job_executions
                (id, job_name, job_key, parameters, status, exit_code,
                 step_executions, failure, created_at, started_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(execution.id)
        .bind(&execution.job_name)
        .bind(&execution.job_key)
        .bind(Json(&execution.parameters))
        .bind(execution.status)
        .bind(&execution.exit_code)
        .bind(Json(&execution.step_executions))
        .bind(&execution.failure)
        .bind(execution.created_at)
        .bind(execution.started_at)
        .bind(execution.ended_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create job execution: {:?}", e);
            AppError::Database(e)
        })?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit job execution: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(execution)
    }

    async fn update_execution(&self, execution: &JobExecution) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE batch_job_executions
            SET status = $2, exit_code = $3, step_executions = $4,
                failure = $5, started_at = $6, ended_at = $7
            WHERE id = $1
            "#,
        )
        .bind(execution.id)
        .bind(execution.status)
        .bind(&execution.exit_code)
        .bind(Json(&execution.step_executions))
        .bind(&execution.failure)
        .bind(execution.started_at)
        .bind(execution.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update job execution: {:?}", e);
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Job execution {} not found",
                execution.id
            )));
        }

        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<JobExecution>> {
        let row = sqlx::query_as::<_, JobExecutionRow>(&format!("{} WHERE id = $1", SELECT_EXECUTION))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get job execution: {:?}", e);
                AppError::Database(e)
            })?;

        Ok(row.map(JobExecution::from))
    }

    async fn list_executions(&self, job_name: &str, limit: i64) -> Result<Vec<JobExecution>> {
        let rows = sqlx::query_as::<_, JobExecutionRow>(&format!(
            "{} WHERE job_name = $1 ORDER BY created_at DESC LIMIT $2",
            SELECT_EXECUTION
        ))
        .bind(job_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list job executions: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(rows.into_iter().map(JobExecution::from).collect())
    }
}

#[cfg(test)]
pub use memory::InMemoryJobRepository;
