//! Request-scoped context carrying a deadline and a cancellation signal
//!
//! Every trait method takes a [`Context`] first so long-running API calls can stop
//! early when Terraform interrupts an apply.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    cancel_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                cancel_tx,
            }),
        }
    }

    /// A fresh context that expires `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let (cancel_tx, _) = watch::channel(*self.inner.cancel_tx.borrow());
        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(Instant::now() + timeout),
                cancel_tx,
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel_tx.borrow()
            || self
                .inner
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn cancel(&self) {
        self.inner.cancel_tx.send_replace(true);
    }

    /// Resolves once [`cancel`](Self::cancel) is called on any clone or the
    /// deadline passes
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancel_tx.subscribe();
        let cancel = async move {
            // The sender lives in `inner`, so the channel cannot close while we wait
            let _ = rx.wait_for(|cancelled| *cancelled).await;
        };

        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancel => {}
                    _ = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => cancel.await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
