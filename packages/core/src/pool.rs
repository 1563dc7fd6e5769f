//! Pool configuration and lifecycle state.

use serde::{Deserialize, Serialize};

/// Environment variable for the number of workers.
pub const WORKERS_ENV: &str = "WORKER_POOL_WORKERS";
/// Environment variable for the job queue capacity.
pub const QUEUE_CAPACITY_ENV: &str = "WORKER_POOL_QUEUE_CAPACITY";
/// Environment variable for the results stream capacity.
pub const RESULTS_CAPACITY_ENV: &str = "WORKER_POOL_RESULTS_CAPACITY";

/// Lifecycle of a pool. Moves strictly forward; `Done` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Constructed, workers not started.
    #[default]
    Created,
    /// Workers are pulling jobs.
    Running,
    /// Workers have stopped; leftover jobs and pending results are flushed.
    Draining,
    /// Results stream closed, no further results will arrive.
    Done,
}

impl PoolState {
    /// Check if the pool is in its terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PoolState::Done)
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolState::Created => write!(f, "created"),
            PoolState::Running => write!(f, "running"),
            PoolState::Draining => write!(f, "draining"),
            PoolState::Done => write!(f, "done"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("worker count must be positive")]
    InvalidWorkerCount,

    #[error("{0} capacity must be positive")]
    InvalidCapacity(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Configuration for pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// Jobs buffered between producers and workers.
    pub queue_capacity: usize,
    /// Results buffered between workers and the consumer.
    pub results_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_workers(4)
    }
}

impl PoolConfig {
    /// Config with both buffers sized to the worker count.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            queue_capacity: worker_count,
            results_capacity: worker_count,
        }
    }

    /// Set the job queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the results stream capacity.
    pub fn with_results_capacity(mut self, capacity: usize) -> Self {
        self.results_capacity = capacity;
        self
    }

    /// Reject sizes the pool cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("queue"));
        }
        if self.results_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("results"));
        }
        Ok(())
    }

    /// Build a config from `WORKER_POOL_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; buffers default to the
    /// worker count when only that is given.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let worker_count = parse_usize_env(WORKERS_ENV)?.unwrap_or(defaults.worker_count);
        let config = Self::with_workers(worker_count);

        let queue_capacity = parse_usize_env(QUEUE_CAPACITY_ENV)?.unwrap_or(config.queue_capacity);
        let results_capacity =
            parse_usize_env(RESULTS_CAPACITY_ENV)?.unwrap_or(config.results_capacity);

        let config = config
            .with_queue_capacity(queue_capacity)
            .with_results_capacity(results_capacity);
        config.validate()?;
        Ok(config)
    }
}

/// Read an optional numeric environment variable.
pub fn parse_usize_env(var_name: &str) -> Result<Option<usize>, ConfigError> {
    let v = match std::env::var(var_name) {
        Ok(v) => v,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(e) => {
            return Err(ConfigError::InvalidConfig(format!(
                "failed reading {var_name}: {e}"
            )));
        }
    };

    let trimmed = v.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<usize>().map(Some).map_err(|_| {
        ConfigError::InvalidConfig(format!(
            "invalid number for {var_name}={v} (expected a non-negative integer)"
        ))
    })
}
