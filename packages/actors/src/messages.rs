//! Message and error types for the pool and its worker actors.

use pool_core::ConfigError;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Pull the next job, or stop if the queue is exhausted or the token ended.
    Next,
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Error type for pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker count must be positive")]
    InvalidWorkerCount,

    #[error("{0} capacity must be positive")]
    InvalidCapacity(&'static str),

    #[error("Pool already started")]
    AlreadyRunning,

    #[error("Results stream already taken")]
    ResultsTaken,

    #[error("Results stream must be taken before the pool runs")]
    ResultsNotTaken,

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job generation aborted after {delivered} jobs ({undelivered} undelivered)")]
    GenerationAborted { delivered: usize, undelivered: usize },

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("Config error: {0}")]
    Config(ConfigError),
}

impl From<ConfigError> for PoolError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidWorkerCount => PoolError::InvalidWorkerCount,
            ConfigError::InvalidCapacity(which) => PoolError::InvalidCapacity(which),
            other => PoolError::Config(other),
        }
    }
}
