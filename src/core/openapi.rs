use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::batch_admin::{dtos as batch_dtos, handlers as batch_handlers};
use crate::modules::batch::{BatchStatus, JobExecution, StepExecution};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        batch_handlers::health,
        batch_handlers::list_jobs,
        batch_handlers::launch_job,
        batch_handlers::list_executions,
        batch_handlers::get_execution,
    ),
    components(
        schemas(
            Meta,
            ApiResponse<batch_dtos::HealthDto>,
            ApiResponse<batch_dtos::JobListDto>,
            ApiResponse<JobExecution>,
            ApiResponse<Vec<JobExecution>>,
            batch_dtos::LaunchJobRequest,
            batch_dtos::JobListDto,
            batch_dtos::HealthDto,
            JobExecution,
            StepExecution,
            BatchStatus,
        )
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "batch", description = "Job launching and execution history"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Dailyfeed Batch API",
        version = "0.1.0",
        description = "Job launching and execution history for dailyfeed batch",
    )
)]
pub struct ApiDoc;

/// Adds the HTTP basic security scheme guarding the admin routes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
