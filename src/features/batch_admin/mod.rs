//! HTTP admin surface of the batch engine.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/health` | Liveness probe |
//! | GET | `/api/batch/jobs` | List registered jobs |
//! | POST | `/api/batch/jobs/{job_name}/executions` | Launch a job |
//! | GET | `/api/batch/jobs/{job_name}/executions` | Recent executions of a job |
//! | GET | `/api/batch/executions/{id}` | One execution with its steps |

pub mod dtos;
pub mod handlers;
pub mod routes;
pub mod services;

pub use services::BatchAdminService;
