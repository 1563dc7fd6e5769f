//! Producer handles for the job queue.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::job::Job;
use crate::messages::{PoolError, PoolResult};

/// Pushes jobs into a pool's queue.
///
/// Sends wait while the queue is full. Once the pool starts shutting down
/// (its run token ended, or it is draining) every pending and future send is
/// aborted instead of waiting. The queue closes for writing when the last
/// feeder is dropped.
#[derive(Clone)]
pub struct JobFeeder {
    tx: mpsc::Sender<Job>,
    shutdown: CancellationToken,
}

impl JobFeeder {
    pub(crate) fn new(tx: mpsc::Sender<Job>, shutdown: CancellationToken) -> Self {
        Self { tx, shutdown }
    }

    /// Push a single job, waiting for space.
    pub async fn submit(&self, job: Job) -> PoolResult<()> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(PoolError::QueueClosed),
            sent = self.tx.send(job) => sent.map_err(|_| PoolError::QueueClosed),
        }
    }

    /// Push every job from `jobs`, then drop this feeder.
    ///
    /// Returns how many jobs were delivered. On shutdown the remaining jobs
    /// are dropped unsent and reported through
    /// [`PoolError::GenerationAborted`]; they produce no results.
    pub async fn generate_from<I>(self, jobs: I) -> PoolResult<usize>
    where
        I: IntoIterator<Item = Job>,
    {
        let mut jobs = jobs.into_iter();
        let mut delivered = 0;
        let mut aborted = false;

        for job in jobs.by_ref() {
            if self.submit(job).await.is_err() {
                aborted = true;
                break;
            }
            delivered += 1;
        }

        if aborted {
            let undelivered = 1 + jobs.count();
            tracing::warn!(
                "Job generation aborted: {} delivered, {} undelivered",
                delivered,
                undelivered
            );
            return Err(PoolError::GenerationAborted {
                delivered,
                undelivered,
            });
        }

        tracing::debug!("Generated {} jobs", delivered);
        Ok(delivered)
    }

    /// Check if the pool stopped accepting jobs.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }
}

impl std::fmt::Debug for JobFeeder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobFeeder")
            .field("closed", &self.is_closed())
            .finish()
    }
}
