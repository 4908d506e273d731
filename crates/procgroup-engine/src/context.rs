use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use event_listener::Event;
use futures_util::future::{select, Either};
use tracing::trace;

use crate::error::{EngineError, EngineResult};

const CANCEL_ORDERING: Ordering = Ordering::SeqCst;

#[derive(Debug)]
struct Cancellation {
    flag: AtomicBool,
    event: Event,
}

/// Cancellation scope of an operation. Clones share the same scope.
#[derive(Debug, Clone)]
pub struct OpContext {
    inner: Arc<Cancellation>,
}

impl Default for OpContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OpContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Cancellation {
                flag: AtomicBool::new(false),
                event: Event::new(),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(CANCEL_ORDERING)
    }

    /// cancel the scope and wake everyone waiting on it
    pub fn cancel(&self) {
        self.inner.flag.store(true, CANCEL_ORDERING);
        self.inner.event.notify(usize::MAX);
    }

    /// resolves once the scope is cancelled
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            trace!("before, already cancelled");
            return;
        }

        let listener = self.inner.event.listen();

        if self.is_cancelled() {
            trace!("after, already cancelled");
            return;
        }

        listener.await
    }

    /// Run `fut` unless the scope is cancelled first
    pub async fn race<F>(&self, fut: F) -> EngineResult<F::Output>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let fut = pin!(fut);
        let cancelled = pin!(self.cancelled());
        match select(fut, cancelled).await {
            Either::Left((output, _)) => Ok(output),
            Either::Right(_) => Err(EngineError::Cancelled),
        }
    }
}
