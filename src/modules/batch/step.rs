use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::modules::batch::execution::StepExecution;
use crate::modules::batch::parameters::JobParameters;

/// A unit of work inside a job.
///
/// Returning `Err` fails the step and, through the launcher, the job.
/// Counters on `execution` are kept even when the step fails.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, params: &JobParameters, execution: &mut StepExecution) -> Result<()>;
}

/// Single-call step body
#[async_trait]
pub trait Tasklet: Send + Sync {
    async fn execute(&self, params: &JobParameters) -> Result<()>;
}

/// Runs a [`Tasklet`] once as one transaction
pub struct TaskletStep {
    name: String,
    tasklet: Arc<dyn Tasklet>,
}

impl TaskletStep {
    pub fn new(name: impl Into<String>, tasklet: Arc<dyn Tasklet>) -> Self {
        Self {
            name: name.into(),
            tasklet,
        }
    }
}

#[async_trait]
impl Step for TaskletStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, params: &JobParameters, execution: &mut StepExecution) -> Result<()> {
        match self.tasklet.execute(params).await {
            Ok(()) => {
                execution.commit_count += 1;
                Ok(())
            }
            Err(e) => {
                execution.rollback_count += 1;
                Err(e)
            }
        }
    }
}
