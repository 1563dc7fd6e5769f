//! Consumer-side views of a pool: the results stream and completion signal.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use pool_core::{JobResult, PoolState};
use tokio::sync::{Notify, mpsc, watch};

/// Receive-only stream of every result produced by a pool.
///
/// Results arrive in completion order, not submission order. The stream ends
/// (`None`) once the pool is done and everything buffered was received.
pub struct ResultStream {
    rx: mpsc::Receiver<JobResult>,
    received: Arc<Notify>,
}

impl ResultStream {
    pub(crate) fn new(rx: mpsc::Receiver<JobResult>, received: Arc<Notify>) -> Self {
        Self { rx, received }
    }

    /// Receive the next result, or `None` once the pool finished.
    pub async fn recv(&mut self) -> Option<JobResult> {
        let result = self.rx.recv().await;
        self.received.notify_one();
        result
    }

    /// Receive every remaining result.
    pub async fn collect_all(mut self) -> Vec<JobResult> {
        let mut results = Vec::new();
        while let Some(result) = self.recv().await {
            results.push(result);
        }
        results
    }
}

impl Stream for ResultStream {
    type Item = JobResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.rx.poll_recv(cx);
        if poll.is_ready() {
            self.received.notify_one();
        }
        poll
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        // Close before notifying so the pool sees nobody is listening.
        self.rx.close();
        self.received.notify_one();
    }
}

/// One-shot notification that a pool will produce no further results.
#[derive(Clone)]
pub struct DoneSignal {
    state: watch::Receiver<PoolState>,
}

impl DoneSignal {
    pub(crate) fn new(state: watch::Receiver<PoolState>) -> Self {
        Self { state }
    }

    /// Wait until the pool reaches [`PoolState::Done`].
    ///
    /// Also returns if the pool was dropped, since nothing can be produced
    /// after that either.
    pub async fn wait(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(PoolState::is_terminal).await;
    }

    pub fn is_done(&self) -> bool {
        self.state.borrow().is_terminal()
    }
}

impl std::fmt::Debug for DoneSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoneSignal")
            .field("done", &self.is_done())
            .finish()
    }
}
