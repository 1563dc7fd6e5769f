//! Actor-based worker pool.
//!
//! This crate runs caller-supplied jobs on a fixed number of Ractor worker
//! actors and streams back one result per job.
//!
//! # Architecture
//!
//! - `WorkerPool` - Owns the job queue, results stream and completion signal
//! - `WorkerActor` - Pulls jobs from the shared queue and executes them
//! - `JobFeeder` - Producer handle that pushes jobs with backpressure
//! - `CancelToken` - Shared cancel/deadline signal checked before each dispatch
//!
//! # Usage
//!
//! ```ignore
//! use actors::{CancelToken, WorkerPool};
//!
//! let pool = Arc::new(WorkerPool::new(4)?);
//! let mut results = pool.results()?;
//!
//! tokio::spawn({ let pool = pool.clone(); async move { pool.generate_from(jobs).await } });
//! tokio::spawn({ let pool = pool.clone(); async move { pool.run(CancelToken::new()).await } });
//!
//! while let Some(result) = results.recv().await {
//!     println!("{}: {:?}", result.descriptor.id, result.value);
//! }
//! ```

mod cancel;
mod feeder;
mod handler;
mod job;
mod messages;
mod pool;
mod stream;
mod worker_actor;

pub use cancel::CancelToken;
pub use feeder::JobFeeder;
pub use handler::{ExecFuture, ExecResult, ExecutionFn, FnExecution, exec_future};
pub use job::Job;
pub use messages::{PoolError, PoolResult, WorkerMessage};
pub use pool::WorkerPool;
pub use stream::{DoneSignal, ResultStream};
pub use worker_actor::{WorkerActor, WorkerActorState};

/// Re-export core types for convenience.
pub use pool_core::{
    CancelReason, JobDescriptor, JobError, JobId, JobMetadata, JobResult, JobType, PoolConfig,
    PoolState,
};
