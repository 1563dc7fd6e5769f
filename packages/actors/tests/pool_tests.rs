#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::{
    CancelToken, ExecutionFn, FnExecution, Job, JobDescriptor, JobError, PoolConfig, PoolError,
    PoolState, WorkerPool, exec_fn, exec_future,
};
use serde_json::{Value, json};
use tokio::sync::Notify;

fn spawn_run(
    pool: &Arc<WorkerPool>,
    token: CancelToken,
) -> tokio::task::JoinHandle<Result<(), PoolError>> {
    let pool = pool.clone();
    tokio::spawn(async move { pool.run(token).await })
}

fn spawn_generate(
    pool: &Arc<WorkerPool>,
    jobs: Vec<Job>,
) -> tokio::task::JoinHandle<Result<usize, PoolError>> {
    let pool = pool.clone();
    tokio::spawn(async move { pool.generate_from(jobs).await })
}

/// A pool whose buffers hold `jobs` entries, so feeding can finish before `run`.
fn roomy_pool(workers: usize, jobs: usize) -> Result<Arc<WorkerPool>, PoolError> {
    let config = PoolConfig::with_workers(workers)
        .with_queue_capacity(jobs)
        .with_results_capacity(jobs);
    Ok(Arc::new(WorkerPool::with_config(config)?))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_pool() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = Arc::new(WorkerPool::new(2)?);
    let mut results = pool.results()?;
    let done = pool.done();

    let generator = spawn_generate(&pool, common::double_jobs(10));
    let runner = spawn_run(&pool, CancelToken::new());

    let mut count = 0;
    while let Some(result) = results.recv().await {
        assert_eq!(result.error, None);
        let expected = common::id_as_int(&result.descriptor) * 2;
        assert_eq!(result.value, Some(json!(expected)));
        assert!(result.worker_id.is_some());
        count += 1;
    }
    assert_eq!(count, 10);

    done.wait().await;
    assert!(done.is_done());
    assert_eq!(generator.await??, 10);
    runner.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn values_do_not_depend_on_worker_count() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let expected: Vec<Value> = (0..25).map(|i| json!(i * 2)).collect();

    for workers in [1, 3, 8] {
        let pool = Arc::new(WorkerPool::new(workers)?);
        let results = pool.results()?;

        let generator = spawn_generate(&pool, common::double_jobs(25));
        let runner = spawn_run(&pool, CancelToken::new());

        let mut values: Vec<Value> = results
            .collect_all()
            .await
            .into_iter()
            .filter_map(|r| r.value)
            .collect();
        values.sort_by_key(|v| v.as_i64());

        assert_eq!(values, expected, "with {} workers", workers);
        generator.await??;
        runner.await??;
    }
    Ok(())
}

#[tokio::test]
async fn test_worker_pool_cancel() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = roomy_pool(2, 10)?;
    let results = pool.results()?;
    assert_eq!(pool.generate_from(common::double_jobs(10)).await?, 10);

    let token = CancelToken::new();
    token.cancel();
    let runner = spawn_run(&pool, token);

    let results = results.collect_all().await;
    runner.await??;
    assert_eq!(results.len(), 10);
    for result in results {
        assert_eq!(result.error, Some(JobError::Cancelled));
        assert!(result.value.is_none());
    }
    Ok(())
}

#[tokio::test]
async fn test_worker_pool_timeout() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = roomy_pool(2, 10)?;
    let results = pool.results()?;
    let done = pool.done();
    pool.generate_from(common::double_jobs(10)).await?;

    let runner = spawn_run(&pool, CancelToken::with_timeout(Duration::ZERO));

    let results = results.collect_all().await;
    runner.await??;
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.error == Some(JobError::DeadlineExceeded)));
    assert!(results.iter().all(|r| r.value.is_none()));
    assert!(done.is_done());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_during_generation_still_answers_every_delivered_job() -> Result<(), Box<dyn Error>>
{
    common::init_tracing();

    let pool = Arc::new(WorkerPool::new(2)?);
    let results = pool.results()?;
    let token = CancelToken::new();

    let runner = spawn_run(&pool, token.clone());
    let generator = spawn_generate(&pool, common::double_jobs(50));
    token.cancel();

    let results = results.collect_all().await;
    runner.await??;

    let delivered = match generator.await? {
        Ok(delivered) => delivered,
        Err(PoolError::GenerationAborted {
            delivered,
            undelivered,
        }) => {
            assert_eq!(delivered + undelivered, 50);
            delivered
        }
        Err(other) => return Err(other.into()),
    };

    assert_eq!(results.len(), delivered);
    for result in results {
        match result.error {
            None => assert!(result.value.is_some()),
            Some(err) => assert_eq!(err, JobError::Cancelled),
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn generation_started_after_cancel_is_aborted() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = Arc::new(WorkerPool::new(2)?);
    let results = pool.results()?;
    let token = CancelToken::new();
    token.cancel();

    let runner = spawn_run(&pool, token);
    assert!(results.collect_all().await.is_empty());
    runner.await??;

    let generator = spawn_generate(&pool, common::double_jobs(5));
    assert_eq!(
        generator.await?,
        Err(PoolError::GenerationAborted {
            delivered: 0,
            undelivered: 5,
        })
    );
    Ok(())
}

#[tokio::test]
async fn untaken_results_are_never_delivered_after_done() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = roomy_pool(2, 4)?;
    let done = pool.done();
    pool.generate_from(common::double_jobs(4)).await?;

    assert_eq!(
        pool.run(CancelToken::new()).await,
        Err(PoolError::ResultsNotTaken)
    );
    assert!(!done.is_done());
    assert_eq!(pool.state(), PoolState::Created);

    let results = pool.results()?;
    let runner = spawn_run(&pool, CancelToken::new());
    assert_eq!(results.collect_all().await.len(), 4);
    runner.await??;

    assert!(done.is_done());
    assert_eq!(pool.results().err(), Some(PoolError::ResultsTaken));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn untaken_results_do_not_block_workers() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = Arc::new(WorkerPool::new(2)?);
    let generator = spawn_generate(&pool, common::double_jobs(10));

    let outcome = tokio::time::timeout(Duration::from_secs(3), pool.run(CancelToken::new())).await?;
    assert_eq!(outcome, Err(PoolError::ResultsNotTaken));

    let results = pool.results()?;
    let runner = spawn_run(&pool, CancelToken::new());
    assert_eq!(results.collect_all().await.len(), 10);
    runner.await??;
    assert_eq!(generator.await??, 10);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn done_waits_for_the_consumer() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = roomy_pool(2, 4)?;
    let mut results = pool.results()?;
    let done = pool.done();
    pool.generate_from(common::double_jobs(4)).await?;

    let runner = spawn_run(&pool, CancelToken::new());

    // Every result fits in the buffer, so workers finish without a reader.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!done.is_done());
    assert_ne!(pool.state(), PoolState::Done);

    let mut count = 0;
    while results.recv().await.is_some() {
        count += 1;
    }
    assert_eq!(count, 4);

    done.wait().await;
    runner.await??;

    // Nothing arrives after completion.
    assert!(results.recv().await.is_none());
    Ok(())
}

#[tokio::test]
async fn wrong_argument_type_is_reported_per_job() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = roomy_pool(1, 2)?;
    let results = pool.results()?;

    let descriptor = JobDescriptor::new("bad")
        .with_type("anyType")
        .with_metadata("foo", "foo");
    let jobs = vec![
        Job::new(descriptor.clone(), common::double(), json!("10")),
        Job::new(JobDescriptor::new("good"), common::double(), json!(10)),
    ];
    pool.generate_from(jobs).await?;
    let runner = spawn_run(&pool, CancelToken::new());

    let mut results = results.collect_all().await;
    runner.await??;
    results.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
    assert_eq!(results.len(), 2);

    assert_eq!(results[0].descriptor, descriptor);
    assert_eq!(
        results[0].error,
        Some(JobError::Execution("wrong argument type".into()))
    );
    assert!(results[0].value.is_none());

    assert_eq!(results[1].value, Some(json!(20)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_job_does_not_take_down_the_pool() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let exec = exec_fn!(|_token, args| {
        let n = args.as_i64().ok_or("wrong argument type")?;
        if n == 3 {
            panic!("job three exploded");
        }
        Ok(json!(n))
    });
    let jobs: Vec<Job> = (0..6)
        .map(|i| Job::new(JobDescriptor::new(i.to_string()), exec.clone(), json!(i)))
        .collect();

    let pool = roomy_pool(2, 6)?;
    let results = pool.results()?;
    pool.generate_from(jobs).await?;
    let runner = spawn_run(&pool, CancelToken::new());

    let results = results.collect_all().await;
    runner.await??;
    assert_eq!(results.len(), 6);

    let panicked: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
    assert_eq!(panicked.len(), 1);
    assert_eq!(panicked[0].descriptor.id.as_str(), "3");
    assert_eq!(
        panicked[0].error,
        Some(JobError::Panicked("job three exploded".into()))
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multiple_feeders_share_the_queue() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = Arc::new(WorkerPool::new(3)?);
    let results = pool.results()?;

    let exec = common::double();
    let mut producers = Vec::new();
    for batch in 0..3 {
        let feeder = pool.feeder()?;
        let jobs: Vec<Job> = (0..5)
            .map(|i| {
                let n = batch * 5 + i;
                Job::new(JobDescriptor::new(n.to_string()), exec.clone(), json!(n))
            })
            .collect();
        producers.push(tokio::spawn(feeder.generate_from(jobs)));
    }
    pool.close_queue();

    let runner = spawn_run(&pool, CancelToken::new());
    let results = results.collect_all().await;

    for producer in producers {
        assert_eq!(producer.await??, 5);
    }
    runner.await??;

    let mut ids: Vec<i64> = results
        .iter()
        .map(|r| common::id_as_int(&r.descriptor))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..15).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn in_flight_execution_is_not_interrupted() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let exec: Arc<dyn ExecutionFn> = {
        let started = started.clone();
        let release = release.clone();
        Arc::new(FnExecution::new(move |_token, args| {
            let started = started.clone();
            let release = release.clone();
            exec_future(async move {
                started.notify_one();
                release.notified().await;
                Ok(args)
            })
        }))
    };

    let pool = roomy_pool(1, 1)?;
    let results = pool.results()?;
    pool.generate_from(vec![Job::new(JobDescriptor::new("slow"), exec, json!("kept"))])
        .await?;

    let token = CancelToken::new();
    let runner = spawn_run(&pool, token.clone());

    started.notified().await;
    token.cancel();
    release.notify_one();

    let results = results.collect_all().await;
    runner.await??;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value, Some(json!("kept")));
    assert_eq!(results[0].error, None);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cooperative_job_can_observe_cancellation() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let exec = exec_fn!(|token, _args| {
        token.cancelled().await;
        Err(format!("stopped: {:?}", token.err()))
    });

    let pool = roomy_pool(1, 1)?;
    let results = pool.results()?;
    pool.generate_from(vec![Job::new(JobDescriptor::new("poller"), exec, Value::Null)])
        .await?;

    let runner = spawn_run(&pool, CancelToken::with_timeout(Duration::from_millis(20)));

    let results = results.collect_all().await;
    runner.await??;
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].error,
        Some(JobError::Execution("stopped: Some(DeadlineExceeded)".into()))
    );
    Ok(())
}

#[tokio::test]
async fn dropped_results_stream_does_not_hang_the_pool() -> Result<(), Box<dyn Error>> {
    common::init_tracing();

    let pool = roomy_pool(2, 10)?;
    let done = pool.done();
    pool.generate_from(common::double_jobs(10)).await?;
    drop(pool.results()?);

    pool.run(CancelToken::new()).await?;
    assert!(done.is_done());
    Ok(())
}
