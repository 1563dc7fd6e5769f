//! Outcome of a single job execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobDescriptor;

/// Why a cancellation token stopped being live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Someone called `cancel()`.
    Cancelled,
    /// The token's deadline elapsed.
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Per-job failure carried in [`JobResult::error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum JobError {
    /// The execution function reported a failure.
    #[error("{0}")]
    Execution(String),

    /// The token was cancelled before the job was dispatched.
    #[error("context canceled")]
    Cancelled,

    /// The token's deadline elapsed before the job was dispatched.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The execution function panicked.
    #[error("execution panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Check if this failure came from the cancellation token.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Cancelled | JobError::DeadlineExceeded)
    }
}

impl From<CancelReason> for JobError {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Cancelled => JobError::Cancelled,
            CancelReason::DeadlineExceeded => JobError::DeadlineExceeded,
        }
    }
}

/// The single outcome record produced for every submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Output of the execution function. Only set on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Descriptor of the job that produced this result.
    pub descriptor: JobDescriptor,
    /// Worker that produced the result. `None` for results emitted while
    /// draining the queue after shutdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// When the result was produced.
    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    pub fn success(descriptor: JobDescriptor, value: serde_json::Value) -> Self {
        Self {
            value: Some(value),
            error: None,
            descriptor,
            worker_id: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(descriptor: JobDescriptor, error: JobError) -> Self {
        Self {
            value: None,
            error: Some(error),
            descriptor,
            worker_id: None,
            completed_at: Utc::now(),
        }
    }

    /// Record which worker produced this result.
    pub fn with_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a plain `Result`, discarding the descriptor.
    pub fn into_result(self) -> Result<serde_json::Value, JobError> {
        match (self.error, self.value) {
            (Some(error), _) => Err(error),
            (None, Some(value)) => Ok(value),
            (None, None) => Ok(serde_json::Value::Null),
        }
    }
}
