//! Shared cancellation token with an optional deadline.
//!
//! Wraps [`CancellationToken`] and adds a deadline plus a sticky
//! [`CancelReason`], so that callers can tell an explicit cancel apart from
//! an elapsed timeout. Clones share state; child tokens observe their parent.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use pool_core::CancelReason;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Inner {
    token: CancellationToken,
    deadline: Option<Instant>,
    reason: OnceLock<CancelReason>,
    parent: Option<CancelToken>,
}

/// Cooperative cancellation signal shared by the pool, its workers and every
/// execution call.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// A token that only ends when cancelled explicitly.
    pub fn new() -> Self {
        Self::build(CancellationToken::new(), None, None)
    }

    /// A token that ends at `deadline`, or earlier if cancelled.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(CancellationToken::new(), Some(deadline), None)
    }

    /// A token that ends after `timeout`, or earlier if cancelled.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token cancelled together with `self`, which can also be cancelled on
    /// its own without affecting the parent.
    pub fn child_token(&self) -> Self {
        Self::build(
            self.inner.token.child_token(),
            self.inner.deadline,
            Some(self.clone()),
        )
    }

    /// Like [`child_token`](Self::child_token) with a deadline no later than
    /// `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < own => parent,
            _ => own,
        };
        Self::build(self.inner.token.child_token(), Some(deadline), Some(self.clone()))
    }

    fn build(
        token: CancellationToken,
        deadline: Option<Instant>,
        parent: Option<CancelToken>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                deadline,
                reason: OnceLock::new(),
                parent,
            }),
        }
    }

    /// Cancel this token and all of its children.
    ///
    /// Has no effect on the reason if the token already ended.
    pub fn cancel(&self) {
        if self.err().is_none() {
            let _ = self.inner.reason.set(CancelReason::Cancelled);
        }
        self.inner.token.cancel();
    }

    /// The reason this token ended, or `None` while it is still live.
    ///
    /// The first observed reason sticks for the lifetime of the token.
    pub fn err(&self) -> Option<CancelReason> {
        if let Some(reason) = self.inner.reason.get() {
            return Some(*reason);
        }
        if let Some(reason) = self.inner.parent.as_ref().and_then(CancelToken::err) {
            return Some(*self.inner.reason.get_or_init(|| reason));
        }
        if self.deadline_elapsed() {
            return Some(
                *self
                    .inner
                    .reason
                    .get_or_init(|| CancelReason::DeadlineExceeded),
            );
        }
        None
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Resolves once the token is cancelled or its deadline elapses.
    pub async fn cancelled(&self) {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }

    fn deadline_elapsed(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("deadline", &self.inner.deadline)
            .field("err", &self.err())
            .finish()
    }
}
