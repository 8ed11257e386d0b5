//! Accrual job configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use accrual_core::ConfigError;

pub const PARAM_THREAD_POOL_SIZE: &str = "thread-pool-size";
pub const PARAM_BATCH_SIZE: &str = "batch-size";
pub const PARAM_LOOKAHEAD_DEPTH: &str = "lookahead-depth";
pub const PARAM_FAILURE_POLICY: &str = "failure-policy";

pub const ENV_THREAD_POOL_SIZE: &str = "ACCRUAL_THREAD_POOL_SIZE";
pub const ENV_BATCH_SIZE: &str = "ACCRUAL_BATCH_SIZE";
pub const ENV_LOOKAHEAD_DEPTH: &str = "ACCRUAL_LOOKAHEAD_DEPTH";
pub const ENV_FAILURE_POLICY: &str = "ACCRUAL_FAILURE_POLICY";

/// What a finished run reports when some accounts failed to post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Failures are logged and counted; the run still succeeds.
    #[default]
    FailOpen,
    /// The whole population is still processed, then the run returns an
    /// error carrying the failure count.
    FailAggregate,
}

impl core::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fail-open" => Ok(Self::FailOpen),
            "fail-aggregate" => Ok(Self::FailAggregate),
            other => Err(ConfigError::invalid(
                PARAM_FAILURE_POLICY,
                format!("unknown policy '{other}' (expected fail-open or fail-aggregate)"),
            )),
        }
    }
}

/// Accrual job configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualJobConfig {
    /// Worker threads; also the number of batches a page is split into
    pub thread_pool_size: usize,
    /// Accounts per posting task
    pub batch_size: usize,
    /// Pages buffered ahead of the page being posted
    pub lookahead_depth: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for AccrualJobConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 4,
            batch_size: 500,
            lookahead_depth: 2,
            failure_policy: FailurePolicy::FailOpen,
        }
    }
}

impl AccrualJobConfig {
    pub fn new(thread_pool_size: usize, batch_size: usize) -> Self {
        Self {
            thread_pool_size,
            batch_size,
            ..Default::default()
        }
    }

    pub fn with_lookahead_depth(mut self, depth: usize) -> Self {
        self.lookahead_depth = depth;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Largest page fetched from the source: one batch per worker.
    pub fn page_size(&self) -> usize {
        self.batch_size.saturating_mul(self.thread_pool_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_pool_size == 0 {
            return Err(ConfigError::invalid(PARAM_THREAD_POOL_SIZE, "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid(PARAM_BATCH_SIZE, "must be at least 1"));
        }
        if self.lookahead_depth == 0 {
            return Err(ConfigError::invalid(PARAM_LOOKAHEAD_DEPTH, "must be at least 1"));
        }
        Ok(())
    }

    /// Build from the parameter map a scheduler passes to a named job.
    ///
    /// `thread-pool-size` and `batch-size` are required.
    pub fn from_job_parameters(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            thread_pool_size: parse_required(params, PARAM_THREAD_POOL_SIZE)?,
            batch_size: parse_required(params, PARAM_BATCH_SIZE)?,
            lookahead_depth: parse_optional(params.get(PARAM_LOOKAHEAD_DEPTH), PARAM_LOOKAHEAD_DEPTH)?
                .unwrap_or(defaults.lookahead_depth),
            failure_policy: parse_optional(params.get(PARAM_FAILURE_POLICY), PARAM_FAILURE_POLICY)?
                .unwrap_or(defaults.failure_policy),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from `ACCRUAL_*` environment variables, defaulting unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| std::env::var(key).ok();
        let config = Self {
            thread_pool_size: parse_optional(var(ENV_THREAD_POOL_SIZE).as_ref(), ENV_THREAD_POOL_SIZE)?
                .unwrap_or(defaults.thread_pool_size),
            batch_size: parse_optional(var(ENV_BATCH_SIZE).as_ref(), ENV_BATCH_SIZE)?
                .unwrap_or(defaults.batch_size),
            lookahead_depth: parse_optional(var(ENV_LOOKAHEAD_DEPTH).as_ref(), ENV_LOOKAHEAD_DEPTH)?
                .unwrap_or(defaults.lookahead_depth),
            failure_policy: parse_optional(var(ENV_FAILURE_POLICY).as_ref(), ENV_FAILURE_POLICY)?
                .unwrap_or(defaults.failure_policy),
        };
        config.validate()?;
        Ok(config)
    }

    /// Render as a job parameter map (inverse of `from_job_parameters`).
    pub fn to_job_parameters(&self) -> HashMap<String, String> {
        let policy = match self.failure_policy {
            FailurePolicy::FailOpen => "fail-open",
            FailurePolicy::FailAggregate => "fail-aggregate",
        };
        HashMap::from([
            (PARAM_THREAD_POOL_SIZE.to_string(), self.thread_pool_size.to_string()),
            (PARAM_BATCH_SIZE.to_string(), self.batch_size.to_string()),
            (PARAM_LOOKAHEAD_DEPTH.to_string(), self.lookahead_depth.to_string()),
            (PARAM_FAILURE_POLICY.to_string(), policy.to_string()),
        ])
    }
}

fn parse_required<T>(params: &HashMap<String, String>, key: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    parse_optional(params.get(key), key)?.ok_or_else(|| ConfigError::missing(key))
}

fn parse_optional<T>(raw: Option<&String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, e.to_string()))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn page_size_is_batch_size_times_pool_size() {
        assert_eq!(AccrualJobConfig::new(2, 2).page_size(), 4);
        assert_eq!(AccrualJobConfig::new(8, 500).page_size(), 4000);
    }

    #[test]
    fn parses_scheduler_parameters() {
        let config = AccrualJobConfig::from_job_parameters(&params(&[
            ("thread-pool-size", "3"),
            ("batch-size", " 100 "),
            ("failure-policy", "fail-aggregate"),
        ]))
        .unwrap();

        assert_eq!(config.thread_pool_size, 3);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.lookahead_depth, 2);
        assert_eq!(config.failure_policy, FailurePolicy::FailAggregate);
    }

    #[test]
    fn missing_required_parameter_is_reported() {
        let err = AccrualJobConfig::from_job_parameters(&params(&[("batch-size", "10")])).unwrap_err();
        assert_eq!(err, ConfigError::missing("thread-pool-size"));
    }

    #[test]
    fn malformed_and_zero_values_are_rejected() {
        let err = AccrualJobConfig::from_job_parameters(&params(&[
            ("thread-pool-size", "four"),
            ("batch-size", "10"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "thread-pool-size"));

        let err = AccrualJobConfig::from_job_parameters(&params(&[
            ("thread-pool-size", "2"),
            ("batch-size", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "batch-size"));

        assert!("fail-fast".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn job_parameters_round_trip() {
        let config = AccrualJobConfig::new(6, 250)
            .with_lookahead_depth(1)
            .with_failure_policy(FailurePolicy::FailAggregate);
        let parsed = AccrualJobConfig::from_job_parameters(&config.to_job_parameters()).unwrap();
        assert_eq!(parsed, config);
    }
}
