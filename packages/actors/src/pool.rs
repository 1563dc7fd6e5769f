//! Worker pool owning the job queue, results stream and completion signal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pool_core::{JobResult, PoolConfig, PoolState};
use ractor::Actor;
use tokio::sync::{Notify, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::cancel::CancelToken;
use crate::feeder::JobFeeder;
use crate::job::Job;
use crate::messages::{PoolError, PoolResult};
use crate::stream::{DoneSignal, ResultStream};
use crate::worker_actor::{SharedQueue, WorkerActor, WorkerArgs};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fixed-size pool of worker actors fed from a bounded queue.
///
/// Typical use: take the [`ResultStream`] and [`DoneSignal`], share the pool
/// behind an `Arc`, then spawn [`generate_from`](Self::generate_from) and
/// [`run`](Self::run) as separate tasks while consuming results.
///
/// ```ignore
/// let pool = Arc::new(WorkerPool::new(2)?);
/// let mut results = pool.results()?;
/// let done = pool.done();
///
/// tokio::spawn({ let pool = pool.clone(); async move { pool.generate_from(jobs).await } });
/// tokio::spawn({ let pool = pool.clone(); async move { pool.run(CancelToken::new()).await } });
///
/// while let Some(result) = results.recv().await { /* ... */ }
/// done.wait().await;
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    /// Primary producer handle; taken by `generate_from` or `close_queue`.
    jobs_tx: Mutex<Option<mpsc::Sender<Job>>>,
    queue: SharedQueue,
    /// Taken by `run` and cloned into each worker.
    results_tx: Mutex<Option<mpsc::Sender<JobResult>>>,
    results_rx: Mutex<Option<ResultStream>>,
    received: Arc<Notify>,
    state: watch::Sender<PoolState>,
    /// Cancelled once the run token ends or the pool starts draining; aborts
    /// feeders.
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Create a pool with `worker_count` workers and buffers of the same size.
    pub fn new(worker_count: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::with_workers(worker_count))
    }

    /// Create a pool configured from `WORKER_POOL_*` environment variables.
    pub fn from_env() -> PoolResult<Self> {
        Self::with_config(PoolConfig::from_env()?)
    }

    /// Create a pool from an explicit configuration.
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity);
        let (results_tx, results_rx) = mpsc::channel(config.results_capacity);
        let received = Arc::new(Notify::new());
        let (state, _) = watch::channel(PoolState::Created);

        Ok(Self {
            config,
            jobs_tx: Mutex::new(Some(jobs_tx)),
            queue: Arc::new(tokio::sync::Mutex::new(jobs_rx)),
            results_tx: Mutex::new(Some(results_tx)),
            results_rx: Mutex::new(Some(ResultStream::new(results_rx, received.clone()))),
            received,
            state,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        *self.state.borrow()
    }

    /// Take the results stream. There is a single consumer per pool.
    pub fn results(&self) -> PoolResult<ResultStream> {
        lock(&self.results_rx).take().ok_or(PoolError::ResultsTaken)
    }

    /// A completion signal that fires once the pool is done.
    pub fn done(&self) -> DoneSignal {
        DoneSignal::new(self.state.subscribe())
    }

    /// An extra producer handle. The queue stays open until every feeder and
    /// the primary producer are gone.
    pub fn feeder(&self) -> PoolResult<JobFeeder> {
        lock(&self.jobs_tx)
            .as_ref()
            .map(|tx| JobFeeder::new(tx.clone(), self.shutdown.clone()))
            .ok_or(PoolError::QueueClosed)
    }

    /// Feed `jobs` through the primary producer, then close it.
    ///
    /// Waits while the queue is full. Can be called once; afterwards the
    /// queue only accepts jobs from feeders obtained earlier. Once the pool
    /// is shutting down nothing is delivered and the whole batch is reported
    /// through [`PoolError::GenerationAborted`].
    pub async fn generate_from<I>(&self, jobs: I) -> PoolResult<usize>
    where
        I: IntoIterator<Item = Job>,
    {
        let taken = lock(&self.jobs_tx).take();
        let Some(tx) = taken else {
            if !self.shutdown.is_cancelled() {
                return Err(PoolError::QueueClosed);
            }
            let undelivered = jobs.into_iter().count();
            tracing::warn!("Job generation aborted: pool is shutting down");
            return Err(PoolError::GenerationAborted {
                delivered: 0,
                undelivered,
            });
        };
        JobFeeder::new(tx, self.shutdown.clone())
            .generate_from(jobs)
            .await
    }

    /// Drop the primary producer without feeding anything.
    pub fn close_queue(&self) {
        lock(&self.jobs_tx).take();
    }

    /// Run the workers until the queue is exhausted or `token` ends.
    ///
    /// Every job that reached the queue yields exactly one result: jobs left
    /// behind by a cancelled run are flushed with the token's reason. Returns
    /// after the consumer received all results (or dropped the stream) and
    /// the completion signal fired. A pool runs at most once, and only after
    /// its results stream was taken.
    pub async fn run(&self, token: CancelToken) -> PoolResult<()> {
        if lock(&self.results_rx).is_some() {
            return Err(PoolError::ResultsNotTaken);
        }

        let started = self.state.send_if_modified(|state| {
            if *state == PoolState::Created {
                *state = PoolState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(PoolError::AlreadyRunning);
        }
        let Some(results_tx) = lock(&self.results_tx).take() else {
            return Err(PoolError::AlreadyRunning);
        };

        tracing::info!("Starting worker pool with {} workers", self.worker_count());

        // Stop producers as soon as the caller's token ends.
        let watcher = {
            let token = token.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => shutdown.cancel(),
                    _ = shutdown.cancelled() => {}
                }
            })
        };

        let workers_token = token.child_token();
        let spawn_error = self.run_workers(&workers_token, &results_tx).await;

        self.state.send_replace(PoolState::Draining);
        self.shutdown.cancel();
        self.close_queue();
        let flushed = self.flush_queue(&workers_token, &results_tx).await;
        if flushed > 0 {
            tracing::info!("Flushed {} queued jobs after shutdown", flushed);
        }

        self.wait_for_consumer(&results_tx).await;
        drop(results_tx);

        let _ = watcher.await;

        self.state.send_replace(PoolState::Done);
        tracing::info!("Worker pool done");

        match spawn_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Spawn every worker and wait for all of them to stop.
    async fn run_workers(
        &self,
        token: &CancelToken,
        results_tx: &mpsc::Sender<JobResult>,
    ) -> Option<PoolError> {
        let mut handles = Vec::with_capacity(self.worker_count());
        let mut spawn_error = None;

        for index in 1..=self.worker_count() {
            let args = WorkerArgs {
                worker_id: format!("worker-{}", index),
                queue: self.queue.clone(),
                results: results_tx.clone(),
                token: token.clone(),
            };

            match Actor::spawn(None, WorkerActor, args).await {
                Ok((_actor, handle)) => handles.push(handle),
                Err(e) => {
                    tracing::error!("Failed to spawn worker-{}: {}", index, e);
                    spawn_error = Some(PoolError::Spawn(e.to_string()));
                    token.cancel();
                    break;
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Worker task ended abnormally: {}", e);
            }
        }

        spawn_error
    }

    /// Close the queue and emit a result for every job still in it.
    async fn flush_queue(
        &self,
        token: &CancelToken,
        results_tx: &mpsc::Sender<JobResult>,
    ) -> usize {
        let mut queue = self.queue.lock().await;
        queue.close();

        let mut flushed = 0;
        while let Some(job) = queue.recv().await {
            let result = job.execute(token).await;
            flushed += 1;
            if results_tx.send(result).await.is_err() {
                tracing::warn!("Results stream dropped while flushing the queue");
            }
        }
        flushed
    }

    /// Wait until every buffered result was received, or the stream was dropped.
    async fn wait_for_consumer(&self, results_tx: &mpsc::Sender<JobResult>) {
        loop {
            if results_tx.is_closed() || results_tx.capacity() == results_tx.max_capacity() {
                return;
            }
            self.received.notified().await;
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
