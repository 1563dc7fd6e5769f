//! Worker actor for executing jobs.

use std::sync::Arc;

use pool_core::JobResult;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::{Mutex, mpsc};

use crate::cancel::CancelToken;
use crate::job::Job;
use crate::messages::WorkerMessage;

/// Job queue receiver shared by every worker of a pool.
///
/// Only one worker holds the lock at a time, so each job is handed out once.
pub(crate) type SharedQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID within the pool.
    pub worker_id: String,
    /// Jobs processed so far.
    pub processed: u64,
    queue: SharedQueue,
    results: mpsc::Sender<JobResult>,
    token: CancelToken,
}

impl WorkerActorState {
    fn new(args: WorkerArgs) -> Self {
        Self {
            worker_id: args.worker_id,
            processed: 0,
            queue: args.queue,
            results: args.results,
            token: args.token,
        }
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub(crate) queue: SharedQueue,
    pub results: mpsc::Sender<JobResult>,
    pub token: CancelToken,
}

/// What a worker observed first while idle.
enum Pulled {
    Job(Job),
    Exhausted,
    Cancelled,
}

async fn pull(queue: &SharedQueue, token: &CancelToken) -> Pulled {
    tokio::select! {
        biased;
        _ = token.cancelled() => Pulled::Cancelled,
        job = async { queue.lock().await.recv().await } => match job {
            Some(job) => Pulled::Job(job),
            None => Pulled::Exhausted,
        },
    }
}

/// Worker actor that pulls jobs from the shared queue until it is exhausted
/// or the token ends.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("Starting worker: {}", args.worker_id);
        Ok(WorkerActorState::new(args))
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        myself.send_message(WorkerMessage::Next)?;
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Next => match pull(&state.queue, &state.token).await {
                Pulled::Job(job) => {
                    let result = job.execute(&state.token).await;
                    state.processed += 1;

                    if state
                        .results
                        .send(result.with_worker(state.worker_id.as_str()))
                        .await
                        .is_err()
                    {
                        tracing::warn!(
                            "Worker {} stopping: results stream dropped",
                            state.worker_id
                        );
                        myself.stop(Some("results stream dropped".into()));
                        return Ok(());
                    }

                    myself.send_message(WorkerMessage::Next)?;
                }
                Pulled::Exhausted => {
                    tracing::debug!("Worker {} found the queue exhausted", state.worker_id);
                    myself.stop(None);
                }
                Pulled::Cancelled => {
                    tracing::debug!(
                        "Worker {} observed cancellation: {:?}",
                        state.worker_id,
                        state.token.err()
                    );
                    myself.stop(None);
                }
            },
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::debug!(
            "Worker {} stopped after {} jobs",
            state.worker_id,
            state.processed
        );
        Ok(())
    }
}
