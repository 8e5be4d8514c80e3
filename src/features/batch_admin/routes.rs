use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::batch_admin::handlers;
use crate::features::batch_admin::services::BatchAdminService;

/// Job launching and execution history
pub fn routes(service: Arc<BatchAdminService>) -> Router {
    Router::new()
        .route("/api/batch/jobs", get(handlers::list_jobs))
        .route(
            "/api/batch/jobs/{job_name}/executions",
            post(handlers::launch_job).get(handlers::list_executions),
        )
        .route("/api/batch/executions/{id}", get(handlers::get_execution))
        .with_state(service)
}

/// Health check, always public
pub fn health_routes() -> Router {
    Router::new().route("/health", get(handlers::health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::middleware::basic_auth_middleware;
    use crate::features::tokens::jobs::{token_cleanup_job, TOKEN_CLEANUP_JOB};
    use crate::features::tokens::stores::{InMemoryRefreshTokenStore, InMemoryTokenBlacklistStore};
    use crate::features::tokens::TokenCleanupService;
    use crate::modules::batch::repository::InMemoryJobRepository;
    use crate::modules::batch::{JobLauncher, JobRegistry};
    use axum::http::{header, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use base64::prelude::*;
    use serde_json::{json, Value};

    fn server() -> TestServer {
        let service = Arc::new(TokenCleanupService::new(
            Arc::new(InMemoryRefreshTokenStore::default()),
            Arc::new(InMemoryTokenBlacklistStore::default()),
        ));
        let mut registry = JobRegistry::new();
        registry.register(token_cleanup_job(service)).unwrap();
        let launcher = Arc::new(JobLauncher::new(
            Arc::new(registry),
            Arc::new(InMemoryJobRepository::new()),
            2,
        ));

        let app = Router::new()
            .merge(routes(Arc::new(BatchAdminService::new(launcher))))
            .merge(health_routes());
        TestServer::new(app).unwrap()
    }

    async fn wait_until_finished(server: &TestServer, id: &str) -> Value {
        for _ in 0..100 {
            let body: Value = server
                .get(&format!("/api/batch/executions/{}", id))
                .await
                .json();
            let status = body["data"]["status"].as_str().unwrap_or_default().to_string();
            if status == "COMPLETED" || status == "FAILED" {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("execution {} did not finish", id);
    }

    #[tokio::test]
    async fn test_health_is_up() {
        let response = server().get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "UP");
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let response = server().get("/api/batch/jobs").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["jobs"], json!([TOKEN_CLEANUP_JOB]));
        assert_eq!(body["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_launch_runs_job_and_records_execution() {
        let server = server();
        let path = format!("/api/batch/jobs/{}/executions", TOKEN_CLEANUP_JOB);

        let response = server
            .post(&path)
            .json(&json!({ "parameters": { "time": "1" } }))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "STARTING");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let finished = wait_until_finished(&server, &id).await;
        assert_eq!(finished["data"]["status"], "COMPLETED");
        assert_eq!(finished["data"]["stepExecutions"].as_array().unwrap().len(), 1);

        let history: Value = server.get(&path).await.json();
        assert_eq!(history["meta"]["total"], 1);

        // Same parameters address the completed instance
        server
            .post(&path)
            .json(&json!({ "parameters": { "time": "1" } }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_launch_rejects_unknown_job_and_bad_parameters() {
        let server = server();

        server
            .post("/api/batch/jobs/noSuchJob/executions")
            .json(&json!({}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .post(&format!("/api/batch/jobs/{}/executions", TOKEN_CLEANUP_JOB))
            .json(&json!({ "parameters": { " ": "x" } }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post(&format!("/api/batch/jobs/{}/executions", TOKEN_CLEANUP_JOB))
            .json(&json!({ "parameters": { "time": 5 } }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job_history_and_execution_are_not_found() {
        let server = server();

        server
            .get("/api/batch/jobs/noSuchJob/executions")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get(&format!("/api/batch/executions/{}", uuid::Uuid::now_v7()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_basic_auth_guards_admin_routes() {
        let launcher = Arc::new(JobLauncher::new(
            Arc::new(JobRegistry::new()),
            Arc::new(InMemoryJobRepository::new()),
            1,
        ));
        let app = routes(Arc::new(BatchAdminService::new(launcher))).layer(
            axum::middleware::from_fn(basic_auth_middleware(Arc::new("ops:secret".to_string()))),
        );
        let server = TestServer::new(app).unwrap();

        server
            .get("/api/batch/jobs")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let credentials = format!("Basic {}", BASE64_STANDARD.encode("ops:secret"));
        server
            .get("/api/batch/jobs")
            .add_header(header::AUTHORIZATION, HeaderValue::from_str(&credentials).unwrap())
            .await
            .assert_status_ok();
    }
}
