//! Cancellation tokens for page render tasks.
//!
//! A token is created for every render task. Superseding the task (scale
//! change, visibility loss, unmount) cancels the token; the task observes it
//! at each suspension point and before committing any output.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::RenderError;

#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(RenderError::Cancelled)` once the token is cancelled.
    pub fn check(&self) -> Result<(), RenderError> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the token is cancelled.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Drives `future` until it completes or the token is cancelled,
    /// whichever happens first.
    pub async fn run<F, T>(&self, future: F) -> Result<T, RenderError>
    where
        F: Future<Output = Result<T, RenderError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(RenderError::Cancelled),
            result = future => {
                self.check()?;
                result
            }
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
