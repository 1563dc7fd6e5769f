#![allow(clippy::disallowed_methods)]
#![allow(dead_code)]

use std::sync::{Arc, Once};

use actors::{ExecutionFn, Job, JobDescriptor, exec_fn};
use serde_json::json;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Doubles an integer argument; anything else is a type mismatch.
pub fn double() -> Arc<dyn ExecutionFn> {
    exec_fn!(|_token, args| {
        let n = args.as_i64().ok_or("wrong argument type")?;
        Ok(json!(n * 2))
    })
}

/// Jobs with ids and arguments `0..count`.
pub fn double_jobs(count: usize) -> Vec<Job> {
    let exec = double();
    (0..count)
        .map(|i| {
            Job::new(
                JobDescriptor::new(i.to_string()).with_type("anyType"),
                exec.clone(),
                json!(i),
            )
        })
        .collect()
}

/// Parse a result's id back into the integer it was built from.
pub fn id_as_int(descriptor: &JobDescriptor) -> i64 {
    descriptor.id.as_str().parse().unwrap()
}
