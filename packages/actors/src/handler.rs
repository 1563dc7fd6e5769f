//! Execution capability trait and closure adapter.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::cancel::CancelToken;

/// Result type for execution functions.
pub type ExecResult = Result<Value, String>;

/// Future type for async execution functions.
pub type ExecFuture = Pin<Box<dyn Future<Output = ExecResult> + Send>>;

/// Box an async block as an [`ExecFuture`].
///
/// Pins the block's output type so `?` works inside it.
pub fn exec_future<F>(fut: F) -> ExecFuture
where
    F: Future<Output = ExecResult> + Send + 'static,
{
    Box::pin(fut)
}

/// Caller-supplied work for a job.
///
/// Implementations are shared between workers and may run concurrently, so
/// any mutable state must be synchronized by the implementor. Arguments are
/// untyped; checking their shape is the implementation's job, and a mismatch
/// should be reported as an `Err` rather than a panic.
pub trait ExecutionFn: Send + Sync + 'static {
    /// Run the job. Long-running work may poll `token` to stop early.
    fn execute(&self, token: CancelToken, args: Value) -> ExecFuture;
}

/// A simple function-based execution capability.
pub struct FnExecution<F>
where
    F: Fn(CancelToken, Value) -> ExecFuture + Send + Sync + 'static,
{
    func: F,
}

impl<F> FnExecution<F>
where
    F: Fn(CancelToken, Value) -> ExecFuture + Send + Sync + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ExecutionFn for FnExecution<F>
where
    F: Fn(CancelToken, Value) -> ExecFuture + Send + Sync + 'static,
{
    fn execute(&self, token: CancelToken, args: Value) -> ExecFuture {
        (self.func)(token, args)
    }
}

/// Helper macro for building an `Arc<dyn ExecutionFn>` from an async body.
///
/// ```ignore
/// let double = actors::exec_fn!(|_token, args| {
///     let n = args.as_i64().ok_or("wrong argument type")?;
///     Ok(serde_json::json!(n * 2))
/// });
/// ```
#[macro_export]
macro_rules! exec_fn {
    (|$token:ident, $args:ident| $body:expr) => {
        ::std::sync::Arc::new($crate::FnExecution::new(
            |$token: $crate::CancelToken, $args: ::serde_json::Value| {
                $crate::exec_future(async move { $body })
            },
        )) as ::std::sync::Arc<dyn $crate::ExecutionFn>
    };
}
