//! Dispatchable job and its single execution step.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use pool_core::{JobDescriptor, JobError, JobResult};
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::handler::ExecutionFn;

/// A unit of work: identity, capability and arguments.
///
/// Built once by the caller and consumed by exactly one worker. Not `Clone`:
///
/// ```compile_fail
/// fn duplicate<T: Clone>(job: &T) -> T { job.clone() }
/// # fn check(job: &actors::Job) { duplicate(job); }
/// ```
pub struct Job {
    descriptor: JobDescriptor,
    exec_fn: Arc<dyn ExecutionFn>,
    args: Value,
}

impl Job {
    pub fn new(descriptor: JobDescriptor, exec_fn: Arc<dyn ExecutionFn>, args: Value) -> Self {
        Self {
            descriptor,
            exec_fn,
            args,
        }
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn args(&self) -> &Value {
        &self.args
    }

    /// Run the job and wrap the outcome in a [`JobResult`].
    ///
    /// A token that already ended short-circuits to its reason without calling
    /// the execution function. Panics inside the function are caught and
    /// reported as [`JobError::Panicked`].
    pub async fn execute(self, token: &CancelToken) -> JobResult {
        let Job {
            descriptor,
            exec_fn,
            args,
        } = self;

        if let Some(reason) = token.err() {
            tracing::debug!("Job {} not started: {}", descriptor.id, reason);
            return JobResult::failure(descriptor, reason.into());
        }

        tracing::debug!("Executing job {}", descriptor.id);

        // Building the future may itself panic, so keep it inside the boundary.
        let outcome = AssertUnwindSafe(async { exec_fn.execute(token.clone(), args).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => JobResult::success(descriptor, value),
            Ok(Err(error)) => {
                tracing::debug!("Job {} failed: {}", descriptor.id, error);
                JobResult::failure(descriptor, JobError::Execution(error))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!("Job {} panicked: {}", descriptor.id, message);
                JobResult::failure(descriptor, JobError::Panicked(message))
            }
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("descriptor", &self.descriptor)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
