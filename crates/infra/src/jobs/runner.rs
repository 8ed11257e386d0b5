//! Name-based entry point for the scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use accrual_core::{ConfigError, ContextProvider};

use super::config::AccrualJobConfig;
use super::error::AccrualJobError;
use super::orchestrator::AccrualPostingJob;
use super::types::RunSummary;
use crate::posting::PostingService;
use crate::source::AccountSource;

/// Jobs this crate can run on behalf of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    PostAccrualInterestForSavings,
}

impl JobName {
    /// Name the scheduler registers the job under.
    pub fn display_name(&self) -> &'static str {
        match self {
            JobName::PostAccrualInterestForSavings => "Post Accrual Interest For Savings",
        }
    }
}

impl core::fmt::Display for JobName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl core::str::FromStr for JobName {
    type Err = ConfigError;

    /// Accepts the display name (case-insensitive) or its kebab/snake form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c.to_ascii_lowercase() })
            .collect();
        match normalized.as_str() {
            "post accrual interest for savings" => Ok(JobName::PostAccrualInterestForSavings),
            _ => Err(ConfigError::invalid("job name", format!("unknown job '{s}'"))),
        }
    }
}

/// Job handler: runs a job from its scheduler parameters.
pub type JobHandler =
    Box<dyn Fn(&HashMap<String, String>) -> Result<RunSummary, AccrualJobError> + Send + Sync>;

/// Runs registered jobs by name, synchronously.
#[derive(Default)]
pub struct ScheduledJobRunner {
    handlers: HashMap<JobName, JobHandler>,
}

impl ScheduledJobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `name`.
    pub fn register_handler<F>(&mut self, name: JobName, handler: F)
    where
        F: Fn(&HashMap<String, String>) -> Result<RunSummary, AccrualJobError> + Send + Sync + 'static,
    {
        self.handlers.insert(name, Box::new(handler));
    }

    /// Register the accrual posting job under its name.
    pub fn with_accrual_posting<S, P, C>(mut self, job: AccrualPostingJob<S, P, C>) -> Self
    where
        S: AccountSource + 'static,
        P: PostingService + 'static,
        C: ContextProvider + 'static,
    {
        let job = Arc::new(job);
        self.register_handler(JobName::PostAccrualInterestForSavings, move |params| {
            let config = AccrualJobConfig::from_job_parameters(params)?;
            job.run_with(&config)
        });
        self
    }

    /// Run the job registered as `job_name` to completion.
    pub fn execute(
        &self,
        job_name: &str,
        params: &HashMap<String, String>,
    ) -> Result<RunSummary, AccrualJobError> {
        let name: JobName = job_name
            .parse()
            .map_err(|_| AccrualJobError::UnknownJob(job_name.to_string()))?;
        let handler = self
            .handlers
            .get(&name)
            .ok_or_else(|| AccrualJobError::UnknownJob(job_name.to_string()))?;

        info!(job = %name, "executing scheduled job");
        handler(params)
    }
}
