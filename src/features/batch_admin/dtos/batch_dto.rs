use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body of a job launch
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchJobRequest {
    /// Job parameters, identifying the job instance
    #[serde(default)]
    #[schema(example = json!({"staleHours": "5"}))]
    pub parameters: BTreeMap<String, String>,
}

/// Query parameters for listing executions
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionListQuery {
    /// Maximum number of executions (default: 20, max: 100)
    #[param(minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
}

/// Registered job names
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobListDto {
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthDto {
    pub status: String,
}
