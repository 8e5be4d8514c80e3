pub mod activities;
pub mod batch_admin;
pub mod deadletters;
pub mod jwt_keys;
pub mod tokens;

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::{BatchConfig, JwtKeyConfig};
use crate::core::error::Result;
use crate::features::activities::PgMemberActivityStore;
use crate::features::deadletters::queue::ActivityDeadLetterQueue;
use crate::features::deadletters::{
    DeadLetterJobs, PgCategorizedDeadLetterStore, PgListenerDeadLetterStore,
    PgRedisDeadLetterStore,
};
use crate::features::jwt_keys::jobs::{jwt_key_init_job, jwt_key_rotation_job};
use crate::features::jwt_keys::{JwtKeyService, PgJwtKeyStore};
use crate::features::tokens::jobs::token_cleanup_job;
use crate::features::tokens::{PgRefreshTokenStore, PgTokenBlacklistStore, TokenCleanupService};
use crate::modules::batch::JobRegistry;

/// Register every job of the application against PostgreSQL stores and the
/// given dead-letter queue
pub fn build_registry(
    pool: &PgPool,
    queue: Arc<dyn ActivityDeadLetterQueue>,
    jwt_key: &JwtKeyConfig,
    batch: &BatchConfig,
) -> Result<JobRegistry> {
    let mut registry = JobRegistry::new();

    let jwt_key_service = Arc::new(JwtKeyService::new(
        Arc::new(PgJwtKeyStore::new(pool.clone())),
        jwt_key.clone(),
    ));
    registry.register(jwt_key_init_job(Arc::clone(&jwt_key_service)))?;
    registry.register(jwt_key_rotation_job(jwt_key_service))?;

    let token_cleanup_service = Arc::new(TokenCleanupService::new(
        Arc::new(PgRefreshTokenStore::new(pool.clone())),
        Arc::new(PgTokenBlacklistStore::new(pool.clone())),
    ));
    registry.register(token_cleanup_job(token_cleanup_service))?;

    let dead_letters = DeadLetterJobs {
        activities: Arc::new(PgMemberActivityStore::new(pool.clone())),
        categorized: Arc::new(PgCategorizedDeadLetterStore::new(pool.clone())),
        listener_letters: Arc::new(PgListenerDeadLetterStore::new(pool.clone())),
        redis_letters: Arc::new(PgRedisDeadLetterStore::new(pool.clone())),
        queue,
        listener_file_path: PathBuf::from(&batch.listener_file_path),
        failure_path: PathBuf::from(&batch.failure_path),
    };
    for job in dead_letters.into_jobs() {
        registry.register(job)?;
    }

    tracing::info!("Registered {} batch jobs", registry.names().len());
    Ok(registry)
}
