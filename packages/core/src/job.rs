//! Job identity types shared between submission and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Caller-chosen identifier for a job.
///
/// The pool never checks uniqueness; callers that need to correlate results
/// must hand out distinct ids themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a job ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh ULID-backed job ID.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Free-form tag classifying a job. The pool attaches no meaning to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(pub String);

impl JobType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobType {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for JobType {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Caller bookkeeping attached to a job.
pub type JobMetadata = BTreeMap<String, String>;

/// Immutable identity of a job, copied verbatim onto its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Identifier used to correlate the job with its result.
    pub id: JobId,
    /// Decorative classification tag.
    #[serde(default)]
    pub job_type: JobType,
    /// Optional string key/value pairs. `None` when the caller set nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,
}

impl JobDescriptor {
    /// Create a descriptor with an empty type and no metadata.
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            job_type: JobType::default(),
            metadata: None,
        }
    }

    /// Set the job type tag.
    pub fn with_type(mut self, job_type: impl Into<JobType>) -> Self {
        self.job_type = job_type.into();
        self
    }

    /// Add a metadata entry, creating the map on first use.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(JobMetadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Look up a metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }
}
