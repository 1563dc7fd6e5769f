//! Core domain types for the worker pool.
//!
//! This crate contains the data shared by the pool and its callers:
//! - JobDescriptor and its parts for identifying work items
//! - JobResult and JobError for per-job outcomes
//! - PoolConfig and PoolState for pool setup and lifecycle

mod job;
mod pool;
mod result;

pub use job::{JobDescriptor, JobId, JobMetadata, JobType};
pub use pool::{
    ConfigError, PoolConfig, PoolState, QUEUE_CAPACITY_ENV, RESULTS_CAPACITY_ENV, WORKERS_ENV,
    parse_usize_env,
};
pub use result::{CancelReason, JobError, JobResult};
