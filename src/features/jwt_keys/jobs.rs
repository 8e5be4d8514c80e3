use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::features::jwt_keys::services::JwtKeyService;
use crate::modules::batch::{Job, JobParameters, Tasklet, TaskletStep};

pub const JWT_KEY_INIT_JOB: &str = "jwtKeyInitJob";
pub const JWT_KEY_INIT_STEP: &str = "jwtKeyInitStep";
pub const JWT_KEY_ROTATION_JOB: &str = "jwtKeyRotationJob";
pub const JWT_KEY_ROTATION_STEP: &str = "jwtKeyRotationStep";

struct JwtKeyInitTasklet {
    service: Arc<JwtKeyService>,
}

#[async_trait]
impl Tasklet for JwtKeyInitTasklet {
    async fn execute(&self, _params: &JobParameters) -> Result<()> {
        tracing::info!("Starting JWT key initialization");
        self.service.initialize_jwt_key().await?;
        tracing::info!("JWT key initialization finished");
        Ok(())
    }
}

struct JwtKeyRotationTasklet {
    service: Arc<JwtKeyService>,
}

#[async_trait]
impl Tasklet for JwtKeyRotationTasklet {
    async fn execute(&self, _params: &JobParameters) -> Result<()> {
        tracing::info!("Starting JWT key rotation check");
        let outcome = self.service.rotate_keys_if_needed().await?;
        tracing::info!(
            "JWT key rotation check finished (new key: {}, deactivated: {})",
            outcome.generated_key_id.as_deref().unwrap_or("none"),
            outcome.deactivated
        );
        Ok(())
    }
}

/// Guarantees a primary signing key exists; run once at deploy time
pub fn jwt_key_init_job(service: Arc<JwtKeyService>) -> Job {
    Job::new(JWT_KEY_INIT_JOB).start(TaskletStep::new(
        JWT_KEY_INIT_STEP,
        Arc::new(JwtKeyInitTasklet { service }),
    ))
}

pub fn jwt_key_rotation_job(service: Arc<JwtKeyService>) -> Job {
    Job::new(JWT_KEY_ROTATION_JOB).start(TaskletStep::new(
        JWT_KEY_ROTATION_STEP,
        Arc::new(JwtKeyRotationTasklet { service }),
    ))
}
