use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::error::{AppError, Result};
use crate::modules::batch::parameters::{JobParameters, JobParametersIncrementer};
use crate::modules::batch::step::Step;

/// Named, ordered sequence of steps
pub struct Job {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    incrementer: Option<Arc<dyn JobParametersIncrementer>>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            incrementer: None,
        }
    }

    pub fn start(self, step: impl Step + 'static) -> Self {
        self.next(step)
    }

    pub fn next(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn incrementer(mut self, incrementer: impl JobParametersIncrementer + 'static) -> Self {
        self.incrementer = Some(Arc::new(incrementer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Parameters the launcher actually runs with
    pub fn prepare_parameters(&self, params: JobParameters) -> JobParameters {
        match &self.incrementer {
            Some(incrementer) => incrementer.next(params),
            None => params,
        }
    }
}

/// Lookup of jobs by name
#[derive(Default)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Arc<Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Job) -> Result<()> {
        if job.steps().is_empty() {
            return Err(AppError::Validation(format!(
                "Job '{}' has no steps",
                job.name()
            )));
        }
        if self.jobs.contains_key(job.name()) {
            return Err(AppError::Conflict(format!(
                "Job '{}' is already registered",
                job.name()
            )));
        }
        self.jobs.insert(job.name().to_string(), Arc::new(job));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Job>> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::JobNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }
}
