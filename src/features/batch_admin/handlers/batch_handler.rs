use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::{AppJson, AppQuery};
use crate::features::batch_admin::dtos::{
    ExecutionListQuery, HealthDto, JobListDto, LaunchJobRequest,
};
use crate::features::batch_admin::services::BatchAdminService;
use crate::modules::batch::JobExecution;
use crate::shared::types::{ApiResponse, Meta};

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = ApiResponse<HealthDto>)
    ),
    tag = "health"
)]
pub async fn health() -> Json<ApiResponse<HealthDto>> {
    Json(ApiResponse::success(
        Some(HealthDto {
            status: "UP".to_string(),
        }),
        None,
        None,
    ))
}

/// List registered jobs
#[utoipa::path(
    get,
    path = "/api/batch/jobs",
    responses(
        (status = 200, description = "Registered job names", body = ApiResponse<JobListDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "batch",
    security(("basic_auth" = []))
)]
pub async fn list_jobs(
    State(service): State<Arc<BatchAdminService>>,
) -> Result<Json<ApiResponse<JobListDto>>> {
    let jobs = service.list_jobs();
    let total = jobs.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(JobListDto { jobs }),
        None,
        Some(Meta { total }),
    )))
}

/// Launch a job asynchronously
#[utoipa::path(
    post,
    path = "/api/batch/jobs/{job_name}/executions",
    params(
        ("job_name" = String, Path, description = "Registered job name")
    ),
    request_body = LaunchJobRequest,
    responses(
        (status = 202, description = "Job launched", body = ApiResponse<JobExecution>),
        (status = 400, description = "Malformed parameters"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Job instance already complete or running")
    ),
    tag = "batch",
    security(("basic_auth" = []))
)]
pub async fn launch_job(
    State(service): State<Arc<BatchAdminService>>,
    Path(job_name): Path<String>,
    AppJson(request): AppJson<LaunchJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JobExecution>>)> {
    let execution = service.launch(&job_name, request.parameters).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            Some(execution),
            Some(format!("Job {} launched", job_name)),
            None,
        )),
    ))
}

/// Recent executions of a job, newest first
#[utoipa::path(
    get,
    path = "/api/batch/jobs/{job_name}/executions",
    params(
        ("job_name" = String, Path, description = "Registered job name"),
        ExecutionListQuery
    ),
    responses(
        (status = 200, description = "Job executions", body = ApiResponse<Vec<JobExecution>>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Unknown job")
    ),
    tag = "batch",
    security(("basic_auth" = []))
)]
pub async fn list_executions(
    State(service): State<Arc<BatchAdminService>>,
    Path(job_name): Path<String>,
    AppQuery(query): AppQuery<ExecutionListQuery>,
) -> Result<Json<ApiResponse<Vec<JobExecution>>>> {
    let executions = service.list_executions(&job_name, query.limit).await?;
    let total = executions.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(executions),
        None,
        Some(Meta { total }),
    )))
}

/// One execution with its step executions
#[utoipa::path(
    get,
    path = "/api/batch/executions/{id}",
    params(
        ("id" = Uuid, Path, description = "Job execution ID")
    ),
    responses(
        (status = 200, description = "Job execution", body = ApiResponse<JobExecution>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Execution not found")
    ),
    tag = "batch",
    security(("basic_auth" = []))
)]
pub async fn get_execution(
    State(service): State<Arc<BatchAdminService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobExecution>>> {
    let execution = service.get_execution(id).await?;
    Ok(Json(ApiResponse::success(Some(execution), None, None)))
}
