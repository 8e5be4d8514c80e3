//! Job/step execution engine: jobs made of tasklet or chunk steps, launched
//! by name with parameters, with every execution recorded.

pub mod chunk;
pub mod execution;
pub mod job;
pub mod launcher;
pub mod parameters;
pub mod repository;
pub mod scheduler;
pub mod step;

pub use chunk::{ChunkComponents, ChunkStep, ItemProcessor, ItemReader, ItemWriter, ListItemReader};
pub use execution::{BatchStatus, JobExecution, StepExecution};
pub use job::{Job, JobRegistry};
pub use launcher::JobLauncher;
pub use parameters::{JobParameters, JobParametersIncrementer, RequestedAtIncrementer};
pub use repository::{JobRepository, PgJobRepository};
pub use scheduler::JobScheduler;
pub use step::{Step, Tasklet, TaskletStep};
