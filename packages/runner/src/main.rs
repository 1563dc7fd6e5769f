//! Runs a batch of doubling jobs through a worker pool and logs the results.
//!
//! Configured through `WORKER_POOL_*` environment variables; see
//! [`WorkerPool::from_env`]. `WORKER_POOL_JOBS` sets the batch size and
//! `WORKER_POOL_TIMEOUT_MS` bounds the whole run.

use std::sync::Arc;
use std::time::Duration;

use actors::{CancelToken, Job, JobDescriptor, WorkerPool, exec_fn};
use pool_core::parse_usize_env;
use serde_json::json;
use tracing_subscriber::EnvFilter;

const JOBS_ENV: &str = "WORKER_POOL_JOBS";
const TIMEOUT_ENV: &str = "WORKER_POOL_TIMEOUT_MS";
const DEFAULT_JOBS: usize = 10;

fn doubling_jobs(count: usize) -> Vec<Job> {
    let exec = exec_fn!(|_token, args| {
        let n = args.as_i64().ok_or("wrong argument type")?;
        Ok(json!(n * 2))
    });

    (0..count)
        .map(|i| {
            let descriptor = JobDescriptor::new(i.to_string())
                .with_type("double")
                .with_metadata("batch", "demo");
            Job::new(descriptor, exec.clone(), json!(i))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let pool = Arc::new(WorkerPool::from_env()?);
    let config = pool.config();
    let job_count = parse_usize_env(JOBS_ENV)?.unwrap_or(DEFAULT_JOBS);
    let token = match parse_usize_env(TIMEOUT_ENV)? {
        Some(ms) => CancelToken::with_timeout(Duration::from_millis(ms as u64)),
        None => CancelToken::new(),
    };

    tracing::info!(
        "Running {} jobs on {} workers (queue {}, results {})",
        job_count,
        config.worker_count,
        config.queue_capacity,
        config.results_capacity
    );

    let mut results = pool.results()?;
    let done = pool.done();

    let generator = tokio::spawn({
        let pool = pool.clone();
        async move { pool.generate_from(doubling_jobs(job_count)).await }
    });
    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.run(token).await }
    });

    let mut succeeded = 0;
    let mut failed = 0;
    while let Some(result) = results.recv().await {
        let id = result.descriptor.id.clone();
        match result.into_result() {
            Ok(value) => {
                succeeded += 1;
                tracing::info!("Job {} -> {}", id, value);
            }
            Err(error) => {
                failed += 1;
                tracing::warn!("Job {} failed: {}", id, error);
            }
        }
    }

    done.wait().await;
    runner.await??;
    match generator.await? {
        Ok(delivered) => tracing::debug!("Generator delivered {} jobs", delivered),
        Err(e) => tracing::warn!("{}", e),
    }

    tracing::info!("Finished: {} succeeded, {} failed", succeeded, failed);
    Ok(())
}
